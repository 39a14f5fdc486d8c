//! # datagrid-provider
//!
//! The DataGrid engine: a declarative field registry plus a parsed client
//! request drive (a) completion of an external select query through the
//! [`query::SelectQuery`] trait and (b) an in-memory row-processing pipeline
//! (filtering, multi-key ordering, paging), producing a normalized JSON
//! envelope for grid- and combobox-style UI components.
//!
//! Per field, filtering and ordering are routed to either the query layer or
//! application memory; global filters are OR-combined across eligible fields
//! and reconciled between the two substrates without double-filtering.

pub mod authorization;
pub mod completion;
pub mod field;
pub mod memory;
pub mod output;
pub mod provider;
pub mod query;
pub mod registry;

pub use authorization::FilterAuthorization;
pub use completion::CompleteQueryOptions;
pub use field::{DataField, FilteringMethod, OrderingMethod};
pub use output::OutputFormat;
pub use provider::{GridSource, Provider};
pub use query::{SelectQuery, SqlSelect};
pub use registry::FieldRegistry;
