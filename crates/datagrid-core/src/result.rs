//! Convenience result type alias for DataGrid.

use crate::error::GridError;

/// A specialized `Result` type for DataGrid operations.
pub type GridResult<T> = Result<T, GridError>;
