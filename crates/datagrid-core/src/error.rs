//! Unified error types for DataGrid.
//!
//! The library is deliberately lenient with client input (malformed filters
//! and orders are dropped at parse time, see [`crate::types::input`]), so
//! errors mostly originate from user-supplied row generation code and are
//! propagated through the ? operator.

use std::fmt;

use thiserror::Error;

/// Top-level error kind categorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// The provider schema is misconfigured.
    Configuration,
    /// The client request could not be used.
    Input,
    /// Query construction or execution failed.
    Query,
    /// Row materialization from the backing source failed.
    Source,
    /// The provider was driven in an unexpected order.
    State,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Input => write!(f, "INPUT"),
            Self::Query => write!(f, "QUERY"),
            Self::Source => write!(f, "SOURCE"),
            Self::State => write!(f, "STATE"),
        }
    }
}

/// The error type used throughout DataGrid.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct GridError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl GridError {
    /// Create a new error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new error wrapping an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Shorthand for a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Shorthand for a source error.
    pub fn source(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Source, message)
    }

    /// Shorthand for a state error.
    pub fn state(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::State, message)
    }
}
