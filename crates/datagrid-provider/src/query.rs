//! The query-layer abstraction and filter/order translation.
//!
//! [`SelectQuery`] is the seam between the engine and whatever builds the
//! actual data-source query. [`SqlSelect`] is the bundled plain-SQL
//! implementation, also used internally as the side accumulator for global
//! filter conditions.

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tracing::warn;

use datagrid_core::types::filter::{Filter, FilterOperator};
use datagrid_core::types::order::{Order, SortDirection};

use crate::field::DataField;

static PARAMETER_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A process-unique bind-parameter name.
pub fn next_parameter_name() -> String {
    let n = PARAMETER_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("p{n}")
}

/// A mutable select query under construction.
///
/// Implementations adapt the engine to a concrete query builder; conditions
/// added through [`SelectQuery::add_where`] are AND-combined.
pub trait SelectQuery {
    /// Add a select term (an expression, possibly aliased).
    fn add_select(&mut self, term: &str);

    /// Add a conjunctive condition.
    fn add_where(&mut self, condition: &str);

    /// Bind a named parameter referenced as `:name` in conditions.
    fn set_parameter(&mut self, name: &str, value: Value);

    /// Append an `ORDER BY` term.
    fn order_by(&mut self, expression: &str, direction: SortDirection);

    /// Restrict the result window.
    fn set_limit(&mut self, offset: u64, limit: u64);
}

/// A plain-SQL select builder.
#[derive(Debug, Clone, Default)]
pub struct SqlSelect {
    from: String,
    selects: Vec<String>,
    wheres: Vec<String>,
    orders: Vec<(String, SortDirection)>,
    limit: Option<(u64, u64)>,
    parameters: Vec<(String, Value)>,
}

impl SqlSelect {
    pub fn new(from: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            ..Self::default()
        }
    }

    /// The accumulated conditions, unjoined.
    pub fn conditions(&self) -> &[String] {
        &self.wheres
    }

    /// The accumulated bind parameters.
    pub fn parameters(&self) -> &[(String, Value)] {
        &self.parameters
    }

    /// Render the full statement.
    pub fn sql(&self) -> String {
        let selects = if self.selects.is_empty() {
            "*".to_string()
        } else {
            self.selects.join(", ")
        };
        let mut sql = format!("SELECT {selects} FROM {}", self.from);
        if !self.wheres.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.wheres.join(" AND "));
        }
        if !self.orders.is_empty() {
            let terms: Vec<String> = self
                .orders
                .iter()
                .map(|(expr, dir)| format!("{expr} {}", dir.as_sql()))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }
        if let Some((offset, limit)) = self.limit {
            sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}"));
        }
        sql
    }

    /// Render the matching-row count statement: same conditions, no select
    /// list, ordering or window.
    pub fn count_sql(&self) -> String {
        let mut sql = format!("SELECT COUNT(*) FROM {}", self.from);
        if !self.wheres.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.wheres.join(" AND "));
        }
        sql
    }
}

impl SelectQuery for SqlSelect {
    fn add_select(&mut self, term: &str) {
        self.selects.push(term.to_string());
    }

    fn add_where(&mut self, condition: &str) {
        self.wheres.push(condition.to_string());
    }

    fn set_parameter(&mut self, name: &str, value: Value) {
        self.parameters.push((name.to_string(), value));
    }

    fn order_by(&mut self, expression: &str, direction: SortDirection) {
        self.orders.push((expression.to_string(), direction));
    }

    fn set_limit(&mut self, offset: u64, limit: u64) {
        self.limit = Some((offset, limit));
    }
}

/// Translate one (filter, field) pair into a query condition.
///
/// Resolves `AUTO` against the field's default operator, applies the field's
/// filter value transform, checks operator/value compatibility, then adds the
/// condition and its bind parameters to `query`. Returns the condition text,
/// or `None` when the pair could not be applied.
pub fn apply_filter_to_query(
    filter: &Filter,
    field: &DataField,
    query: &mut dyn SelectQuery,
) -> Option<String> {
    let operator = match filter.operator() {
        FilterOperator::Auto => match field.default_operator() {
            Some(op) => op,
            None => {
                warn!(
                    field = field.name(),
                    "AUTO filter on a field without a default operator; skipping"
                );
                return None;
            }
        },
        op => op,
    };

    let value = match field.filter_value_transform() {
        Some(transform) => transform(field, filter),
        None => filter.value().clone(),
    };

    if !Filter::is_compatible(operator, &value) {
        warn!(
            field = field.name(),
            operator = operator.as_str(),
            "incompatible operator/value pair after transform; skipping"
        );
        return None;
    }

    let expression = field.expression();
    let condition = match operator {
        FilterOperator::IsNull => format!("{expression} IS NULL"),
        FilterOperator::IsNotNull => format!("{expression} IS NOT NULL"),
        FilterOperator::Eq
        | FilterOperator::Ne
        | FilterOperator::Gt
        | FilterOperator::Lt
        | FilterOperator::Gte
        | FilterOperator::Lte => {
            let parameter = next_parameter_name();
            query.set_parameter(&parameter, value);
            format!("{expression} {} :{parameter}", operator.as_str())
        }
        FilterOperator::Like | FilterOperator::NotLike => {
            let parameter = next_parameter_name();
            // wrap in wildcards unless the client supplied its own
            let pattern = match value.as_str() {
                Some(s) if !s.contains('%') => Value::String(format!("%{s}%")),
                _ => value,
            };
            query.set_parameter(&parameter, pattern);
            let keyword = if operator == FilterOperator::Like {
                "LIKE"
            } else {
                "NOT LIKE"
            };
            format!("{expression} {keyword} :{parameter}")
        }
        FilterOperator::In | FilterOperator::NotIn => {
            let parameter = next_parameter_name();
            query.set_parameter(&parameter, value);
            let keyword = if operator == FilterOperator::In {
                "IN"
            } else {
                "NOT IN"
            };
            format!("{expression} {keyword} (:{parameter})")
        }
        FilterOperator::Between | FilterOperator::NotBetween => {
            let bounds = value.as_array()?.clone();
            let low = next_parameter_name();
            let high = next_parameter_name();
            query.set_parameter(&low, bounds[0].clone());
            query.set_parameter(&high, bounds[1].clone());
            let keyword = if operator == FilterOperator::Between {
                "BETWEEN"
            } else {
                "NOT BETWEEN"
            };
            format!("{expression} {keyword} :{low} AND :{high}")
        }
        FilterOperator::Auto => return None,
    };

    query.add_where(&condition);
    Some(condition)
}

/// Translate one (order, field) pair into an `ORDER BY` term.
pub fn apply_order_to_query(order: &Order, field: &DataField, query: &mut dyn SelectQuery) {
    query.order_by(field.expression(), order.direction);
}
