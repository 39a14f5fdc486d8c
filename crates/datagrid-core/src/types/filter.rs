//! Filter requests and their native evaluation semantics.
//!
//! A [`Filter`] is the validated form of one client-submitted filter entry.
//! Operator/value shape compatibility is enforced at construction, so an
//! incompatible raw filter never reaches evaluation. Evaluation itself is
//! fail-open: a pair that slips through authorization but turns out
//! incompatible does not exclude any row (see [`Filter::evaluate`]).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::types::value::{ValueType, is_scalar};

/// Filter comparison operator, as submitted on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperator {
    /// Resolve to the target field's default operator.
    Auto,
    /// Exact equality.
    Eq,
    /// Not equal.
    Ne,
    /// Greater than.
    Gt,
    /// Less than.
    Lt,
    /// Greater than or equal.
    Gte,
    /// Less than or equal.
    Lte,
    /// Substring containment / SQL `LIKE`.
    Like,
    /// Negated `LIKE`.
    NotLike,
    /// List membership.
    In,
    /// Negated list membership.
    NotIn,
    /// Inclusive range against a 2-element bound.
    Between,
    /// Negated inclusive range.
    NotBetween,
    /// SQL `IS NULL`; no native in-memory evaluation.
    IsNull,
    /// SQL `IS NOT NULL`; no native in-memory evaluation.
    IsNotNull,
}

impl FilterOperator {
    /// Parse a wire token. Returns `None` for anything unknown.
    pub fn parse(token: &str) -> Option<Self> {
        Some(match token {
            "AUTO" => Self::Auto,
            "=" => Self::Eq,
            "!=" => Self::Ne,
            ">" => Self::Gt,
            "<" => Self::Lt,
            ">=" => Self::Gte,
            "<=" => Self::Lte,
            "LIKE" => Self::Like,
            "!LIKE" => Self::NotLike,
            "IN" => Self::In,
            "!IN" => Self::NotIn,
            "BETWEEN" => Self::Between,
            "!BETWEEN" => Self::NotBetween,
            "IS_NULL" => Self::IsNull,
            "!IS_NULL" => Self::IsNotNull,
            _ => return None,
        })
    }

    /// The wire token for this operator. For the comparison operators this is
    /// also the SQL symbol.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "AUTO",
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Gte => ">=",
            Self::Lte => "<=",
            Self::Like => "LIKE",
            Self::NotLike => "!LIKE",
            Self::In => "IN",
            Self::NotIn => "!IN",
            Self::Between => "BETWEEN",
            Self::NotBetween => "!BETWEEN",
            Self::IsNull => "IS_NULL",
            Self::IsNotNull => "!IS_NULL",
        }
    }

    /// Whether this operator tests for null and carries no value.
    pub const fn is_null_test(&self) -> bool {
        matches!(self, Self::IsNull | Self::IsNotNull)
    }
}

/// The set of fields a global filter may test against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterScope {
    /// Every field not excluded from global filtering.
    Auto,
    /// Only the listed field names.
    Fields(Vec<String>),
}

/// Whether a filter targets one field or is evaluated across fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterKind {
    /// Bound to the named field.
    ForField(String),
    /// Global: a row matches if any in-scope field matches.
    Global,
}

/// A validated filter request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    kind: FilterKind,
    operator: FilterOperator,
    value: Value,
    scope: FilterScope,
}

impl Filter {
    /// Build a filter bound to one field. Returns `None` when the
    /// operator/value pair is incompatible.
    pub fn for_field(
        field: impl Into<String>,
        operator: FilterOperator,
        value: Value,
    ) -> Option<Self> {
        Self::build(FilterKind::ForField(field.into()), operator, value)
    }

    /// Build a global filter. Returns `None` when the operator/value pair is
    /// incompatible.
    pub fn global(operator: FilterOperator, value: Value) -> Option<Self> {
        Self::build(FilterKind::Global, operator, value)
    }

    fn build(kind: FilterKind, operator: FilterOperator, value: Value) -> Option<Self> {
        if !Self::is_compatible(operator, &value) {
            return None;
        }
        Some(Self {
            kind,
            operator,
            value,
            scope: FilterScope::Auto,
        })
    }

    /// Restrict a global filter to an explicit field set.
    pub fn with_scope(mut self, scope: FilterScope) -> Self {
        self.scope = scope;
        self
    }

    /// Parse one raw wire entry (`{ operator, value, scope? }`).
    ///
    /// Lenient by contract: an unknown operator falls back to `AUTO`, a
    /// malformed scope falls back to `AUTO`, and a missing/empty value or an
    /// incompatible operator/value shape drops the whole entry.
    pub fn from_raw(kind: FilterKind, raw: &Value) -> Option<Self> {
        let entry = raw.as_object()?;

        let operator = entry
            .get("operator")
            .and_then(Value::as_str)
            .and_then(FilterOperator::parse)
            .unwrap_or(FilterOperator::Auto);

        let scope = match entry.get("scope") {
            None => FilterScope::Auto,
            Some(Value::String(s)) if s == "AUTO" => FilterScope::Auto,
            Some(Value::String(s)) => FilterScope::Fields(vec![s.clone()]),
            Some(Value::Array(items)) => FilterScope::Fields(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect(),
            ),
            Some(_) => FilterScope::Auto,
        };

        let value = if operator.is_null_test() {
            entry.get("value").cloned().unwrap_or(Value::Null)
        } else {
            match entry.get("value") {
                None | Some(Value::Null) => {
                    debug!(?kind, "dropping filter without a value");
                    return None;
                }
                Some(Value::String(s)) if s.is_empty() => {
                    debug!(?kind, "dropping filter with an empty value");
                    return None;
                }
                Some(v) => v.clone(),
            }
        };

        if !Self::is_compatible(operator, &value) {
            debug!(
                operator = operator.as_str(),
                ?kind,
                "dropping filter with incompatible operator/value shape"
            );
            return None;
        }

        Some(Self {
            kind,
            operator,
            value,
            scope,
        })
    }

    /// Operator/value shape compatibility, shared by parsing and evaluation.
    pub fn is_compatible(operator: FilterOperator, value: &Value) -> bool {
        match operator {
            FilterOperator::Auto => true,
            FilterOperator::Eq | FilterOperator::Ne => is_scalar(value) || value.is_null(),
            FilterOperator::Gt
            | FilterOperator::Lt
            | FilterOperator::Gte
            | FilterOperator::Lte
            | FilterOperator::Like
            | FilterOperator::NotLike => {
                is_scalar(value) && value.as_str() != Some("")
            }
            FilterOperator::In | FilterOperator::NotIn => {
                value.as_array().is_some_and(|items| !items.is_empty())
            }
            FilterOperator::Between | FilterOperator::NotBetween => {
                value.as_array().is_some_and(|items| items.len() == 2)
            }
            FilterOperator::IsNull | FilterOperator::IsNotNull => true,
        }
    }

    /// Native in-memory predicate: does a row value pass this operator and
    /// filter value under the given typing policy?
    ///
    /// The operator must already be resolved (`AUTO` replaced by the field
    /// default) and the filter value already transformed. Incompatible pairs
    /// and the reserved null tests never exclude a row.
    pub fn evaluate(
        operator: FilterOperator,
        filter_value: &Value,
        row_value: &Value,
        value_type: ValueType,
    ) -> bool {
        if !Self::is_compatible(operator, filter_value) {
            warn!(
                operator = operator.as_str(),
                "incompatible operator/value pair reached evaluation; not excluding row"
            );
            return true;
        }

        match operator {
            FilterOperator::Eq => value_type.equals(row_value, filter_value),
            FilterOperator::Ne => !value_type.equals(row_value, filter_value),
            FilterOperator::Gt => {
                value_type.compare(row_value, filter_value) == Some(std::cmp::Ordering::Greater)
            }
            FilterOperator::Lt => {
                value_type.compare(row_value, filter_value) == Some(std::cmp::Ordering::Less)
            }
            FilterOperator::Gte => matches!(
                value_type.compare(row_value, filter_value),
                Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
            ),
            FilterOperator::Lte => matches!(
                value_type.compare(row_value, filter_value),
                Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
            ),
            FilterOperator::Like => value_type.contains(row_value, filter_value),
            FilterOperator::NotLike => !value_type.contains(row_value, filter_value),
            FilterOperator::In => filter_value
                .as_array()
                .is_some_and(|items| items.iter().any(|v| value_type.equals(row_value, v))),
            FilterOperator::NotIn => !filter_value
                .as_array()
                .is_some_and(|items| items.iter().any(|v| value_type.equals(row_value, v))),
            FilterOperator::Between => filter_value
                .as_array()
                .is_some_and(|b| value_type.between(row_value, &b[0], &b[1])),
            FilterOperator::NotBetween => !filter_value
                .as_array()
                .is_some_and(|b| value_type.between(row_value, &b[0], &b[1])),
            FilterOperator::IsNull | FilterOperator::IsNotNull => {
                warn!(
                    operator = operator.as_str(),
                    "null-test operators have no native in-memory evaluation; not excluding row"
                );
                true
            }
            FilterOperator::Auto => true,
        }
    }

    /// Whether this filter may test the named field.
    ///
    /// Always true for field-bound filters; global filters consult their
    /// scope.
    pub fn is_field_in_scope(&self, field_name: &str) -> bool {
        if self.kind != FilterKind::Global {
            return true;
        }
        match &self.scope {
            FilterScope::Auto => true,
            FilterScope::Fields(names) => names.iter().any(|n| n == field_name),
        }
    }

    /// The filter kind.
    pub fn kind(&self) -> &FilterKind {
        &self.kind
    }

    /// The bound field name, for field-bound filters.
    pub fn field_name(&self) -> Option<&str> {
        match &self.kind {
            FilterKind::ForField(name) => Some(name),
            FilterKind::Global => None,
        }
    }

    /// Whether this is a global filter.
    pub fn is_global(&self) -> bool {
        self.kind == FilterKind::Global
    }

    /// The submitted operator (possibly `AUTO`).
    pub fn operator(&self) -> FilterOperator {
        self.operator
    }

    /// The submitted value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The scope of a global filter.
    pub fn scope(&self) -> &FilterScope {
        &self.scope
    }
}
