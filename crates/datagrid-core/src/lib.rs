//! # datagrid-core
//!
//! Core crate for DataGrid. Contains the parsed request model (filters,
//! orders, paging, selectors), the value typing policy, the row container,
//! and the unified error system.
//!
//! This crate has **no** internal dependencies on other DataGrid crates.

pub mod error;
pub mod result;
pub mod selector;
pub mod types;

pub use error::GridError;
pub use result::GridResult;
