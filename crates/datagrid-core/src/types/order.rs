//! Sort order requests.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending order.
    #[default]
    Asc,
    /// Descending order.
    Desc,
}

impl SortDirection {
    /// Return the SQL keyword for this direction.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// A sort request on one field.
///
/// The sequence of orders in a request is significant: it is the multi-key
/// tie-break chain, first entry being the primary sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Field name to sort by.
    pub field: String,
    /// Sort direction.
    #[serde(default)]
    pub direction: SortDirection,
}

impl Order {
    /// Create a new order.
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    /// Create an ascending order on the given field.
    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Asc)
    }

    /// Create a descending order on the given field.
    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Desc)
    }

    /// Parse one raw wire entry (`{ field, dir }`).
    ///
    /// Entries with missing keys, non-string values or an unknown direction
    /// are dropped.
    pub fn from_raw(raw: &Value) -> Option<Self> {
        let entry = raw.as_object()?;
        let field = entry.get("field")?.as_str()?;
        let dir = entry.get("dir")?.as_str()?;

        let direction = match dir.to_ascii_lowercase().as_str() {
            "asc" => SortDirection::Asc,
            "desc" => SortDirection::Desc,
            other => {
                debug!(field, dir = other, "dropping order with unknown direction");
                return None;
            }
        };

        Some(Self::new(field, direction))
    }
}
