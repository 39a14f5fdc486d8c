//! Per-field value typing policy.
//!
//! Every field declares a [`ValueType`] so that comparisons, equality and
//! containment behave deterministically instead of relying on implicit
//! cross-type coercion. Values travel as [`serde_json::Value`]; this module
//! centralises the coercion rules applied before any two of them meet.

use std::cmp::Ordering;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared type of a field's values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// Lexicographic string comparison.
    #[default]
    String,
    /// Numeric comparison; numeric strings are accepted.
    Number,
    /// Date/datetime comparison; RFC 3339, `Y-m-d H:M:S` and `Y-m-d` strings.
    Date,
}

impl ValueType {
    /// Compare two values under this typing policy.
    ///
    /// Returns `None` when either side cannot be coerced.
    pub fn compare(&self, a: &Value, b: &Value) -> Option<Ordering> {
        match self {
            Self::String => Some(as_text(a)?.cmp(&as_text(b)?)),
            Self::Number => as_number(a)?.partial_cmp(&as_number(b)?),
            Self::Date => Some(as_date(a)?.cmp(&as_date(b)?)),
        }
    }

    /// Typed equality: both sides coerce and compare equal.
    pub fn equals(&self, a: &Value, b: &Value) -> bool {
        self.compare(a, b) == Some(Ordering::Equal)
    }

    /// Case-sensitive substring containment on the textual forms.
    pub fn contains(&self, haystack: &Value, needle: &Value) -> bool {
        match (as_text(haystack), as_text(needle)) {
            (Some(h), Some(n)) => h.contains(&n),
            _ => false,
        }
    }

    /// Inclusive range test against two bounds.
    pub fn between(&self, value: &Value, low: &Value, high: &Value) -> bool {
        matches!(self.compare(value, low), Some(Ordering::Greater | Ordering::Equal))
            && matches!(self.compare(value, high), Some(Ordering::Less | Ordering::Equal))
    }
}

/// Whether a value is a scalar (string, number or boolean).
pub fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

/// Whether a value is numeric (a number, or a string parsing as one).
pub fn is_numeric(value: &Value) -> bool {
    as_number(value).is_some()
}

/// Coerce to a number, accepting numeric strings.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Coerce to the textual form used for string comparison and LIKE.
pub fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Coerce to a datetime. Accepts RFC 3339, `Y-m-d H:M:S` and bare `Y-m-d`.
pub fn as_date(value: &Value) -> Option<NaiveDateTime> {
    let text = match value {
        Value::String(s) => s.trim(),
        _ => return None,
    };
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
