//! Declarative field descriptors.
//!
//! A [`DataField`] describes one exposed column: whether it can be filtered
//! and ordered, by which substrate (query layer or application memory), with
//! what authorization policy, and through which optional hooks. Fields are
//! the unit of routing for the whole engine.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use datagrid_core::types::filter::{Filter, FilterOperator};
use datagrid_core::types::order::Order;
use datagrid_core::types::row::Row;
use datagrid_core::types::value::ValueType;

use crate::authorization::FilterAuthorization;
use crate::query::SelectQuery;

/// Where a field's filtering is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilteringMethod {
    /// Translate filters into query conditions.
    #[default]
    Query,
    /// Evaluate filters in memory with the built-in typed predicates.
    MemoryAuto,
    /// Evaluate filters in memory with the field's custom row predicate.
    MemoryCustom,
}

impl FilteringMethod {
    /// Whether this method runs in application memory.
    pub fn is_memory(self) -> bool {
        !matches!(self, Self::Query)
    }
}

/// Where a field's ordering is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingMethod {
    /// Translate orders into query `ORDER BY` terms.
    #[default]
    Query,
    /// Sort in memory with the built-in typed comparison.
    MemoryAuto,
    /// Sort in memory with the field's custom comparator.
    MemoryCustom,
}

impl OrderingMethod {
    /// Whether this method runs in application memory.
    pub fn is_memory(self) -> bool {
        !matches!(self, Self::Query)
    }
}

/// Replaces the built-in select completion for a field.
pub type SelectInjector = Arc<dyn Fn(&DataField, &mut dyn SelectQuery) + Send + Sync>;

/// Replaces the built-in filter-to-condition translation for a field.
pub type FilterInjector = Arc<dyn Fn(&DataField, &Filter, &mut dyn SelectQuery) + Send + Sync>;

/// Replaces the built-in order-to-`ORDER BY` translation for a field.
pub type OrderInjector = Arc<dyn Fn(&DataField, &Order, &mut dyn SelectQuery) + Send + Sync>;

/// Rewrites a filter's value before it reaches the query layer.
pub type FilterValueTransform = Arc<dyn Fn(&DataField, &Filter) -> Value + Send + Sync>;

/// Rewrites a row value before memory filtering evaluates it.
pub type RowValueTransform = Arc<dyn Fn(&DataField, &Value, &Row) -> Value + Send + Sync>;

/// Rewrites a row value before it becomes a sort key.
pub type OrderValueTransform = Arc<dyn Fn(&DataField, &Value) -> Value + Send + Sync>;

/// Custom memory-filtering predicate: filter, extracted row value, full row.
pub type RowPredicate = Arc<dyn Fn(&DataField, &Filter, &Value, &Row) -> bool + Send + Sync>;

/// Custom memory-ordering comparator over two sort keys. The comparator is
/// responsible for honoring the order's direction itself.
pub type RowComparator =
    Arc<dyn Fn(&DataField, &Order, &Value, &Value) -> std::cmp::Ordering + Send + Sync>;

/// One exposed column of a data source.
pub struct DataField {
    name: String,
    enabled: bool,
    filterable: bool,
    orderable: bool,
    excluded_from_global: bool,
    default_operator: Option<FilterOperator>,
    value_type: ValueType,
    authorization: FilterAuthorization,
    filtering_method: FilteringMethod,
    ordering_method: OrderingMethod,
    expression: Option<String>,
    select_injector: Option<SelectInjector>,
    filter_injector: Option<FilterInjector>,
    order_injector: Option<OrderInjector>,
    filter_value_transform: Option<FilterValueTransform>,
    row_value_transform: Option<RowValueTransform>,
    order_value_transform: Option<OrderValueTransform>,
    row_predicate: Option<RowPredicate>,
    row_comparator: Option<RowComparator>,
}

impl std::fmt::Debug for DataField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataField")
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("filterable", &self.filterable)
            .field("orderable", &self.orderable)
            .field("excluded_from_global", &self.excluded_from_global)
            .field("default_operator", &self.default_operator)
            .field("value_type", &self.value_type)
            .field("filtering_method", &self.filtering_method)
            .field("ordering_method", &self.ordering_method)
            .field("expression", &self.expression)
            .finish_non_exhaustive()
    }
}

impl DataField {
    /// A new field: enabled, filterable and orderable through the query
    /// layer, string-typed, `LIKE` as the default operator, and the common
    /// string authorization policy.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            filterable: true,
            orderable: true,
            excluded_from_global: false,
            default_operator: Some(FilterOperator::Like),
            value_type: ValueType::String,
            authorization: FilterAuthorization::common_string(),
            filtering_method: FilteringMethod::Query,
            ordering_method: OrderingMethod::Query,
            expression: None,
            select_injector: None,
            filter_injector: None,
            order_injector: None,
            filter_value_transform: None,
            row_value_transform: None,
            order_value_transform: None,
            row_predicate: None,
            row_comparator: None,
        }
    }

    /// The field name, as used in requests and output.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_filterable(&self) -> bool {
        self.filterable
    }

    pub fn is_orderable(&self) -> bool {
        self.orderable
    }

    pub fn is_excluded_from_global(&self) -> bool {
        self.excluded_from_global
    }

    /// The operator substituted for `AUTO` filters on this field.
    pub fn default_operator(&self) -> Option<FilterOperator> {
        self.default_operator
    }

    /// The type under which memory filtering and sorting interpret values.
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn authorization(&self) -> &FilterAuthorization {
        &self.authorization
    }

    pub fn filtering_method(&self) -> FilteringMethod {
        self.filtering_method
    }

    pub fn ordering_method(&self) -> OrderingMethod {
        self.ordering_method
    }

    /// The query-layer expression standing for this field; the field name
    /// when unset.
    pub fn expression(&self) -> &str {
        self.expression.as_deref().unwrap_or(&self.name)
    }

    pub fn select_injector(&self) -> Option<&SelectInjector> {
        self.select_injector.as_ref()
    }

    pub fn filter_injector(&self) -> Option<&FilterInjector> {
        self.filter_injector.as_ref()
    }

    pub fn order_injector(&self) -> Option<&OrderInjector> {
        self.order_injector.as_ref()
    }

    pub fn filter_value_transform(&self) -> Option<&FilterValueTransform> {
        self.filter_value_transform.as_ref()
    }

    pub fn row_value_transform(&self) -> Option<&RowValueTransform> {
        self.row_value_transform.as_ref()
    }

    pub fn order_value_transform(&self) -> Option<&OrderValueTransform> {
        self.order_value_transform.as_ref()
    }

    pub fn row_predicate(&self) -> Option<&RowPredicate> {
        self.row_predicate.as_ref()
    }

    pub fn row_comparator(&self) -> Option<&RowComparator> {
        self.row_comparator.as_ref()
    }

    /// Whether the given filter may be applied to this field. Global filters
    /// are additionally gated by the global-exclusion flag.
    pub fn is_filter_authorized(&self, filter: &Filter) -> bool {
        if filter.is_global() && self.excluded_from_global {
            return false;
        }
        self.authorization.is_authorized(filter)
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_filterable(mut self, filterable: bool) -> Self {
        self.filterable = filterable;
        self
    }

    pub fn with_orderable(mut self, orderable: bool) -> Self {
        self.orderable = orderable;
        self
    }

    pub fn with_excluded_from_global(mut self, excluded: bool) -> Self {
        self.excluded_from_global = excluded;
        self
    }

    /// Set the operator substituted for `AUTO` filters; `None` makes `AUTO`
    /// filters unresolvable on this field.
    pub fn with_default_operator(mut self, operator: Option<FilterOperator>) -> Self {
        self.default_operator = operator;
        self
    }

    pub fn with_value_type(mut self, value_type: ValueType) -> Self {
        self.value_type = value_type;
        self
    }

    pub fn with_authorization(mut self, authorization: FilterAuthorization) -> Self {
        self.authorization = authorization;
        self
    }

    pub fn with_filtering_method(mut self, method: FilteringMethod) -> Self {
        self.filtering_method = method;
        self
    }

    pub fn with_ordering_method(mut self, method: OrderingMethod) -> Self {
        self.ordering_method = method;
        self
    }

    /// Set the query-layer expression (e.g. `u.last_name`).
    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    pub fn with_select_injector(mut self, injector: SelectInjector) -> Self {
        self.select_injector = Some(injector);
        self
    }

    pub fn with_filter_injector(mut self, injector: FilterInjector) -> Self {
        self.filter_injector = Some(injector);
        self
    }

    pub fn with_order_injector(mut self, injector: OrderInjector) -> Self {
        self.order_injector = Some(injector);
        self
    }

    pub fn with_filter_value_transform(mut self, transform: FilterValueTransform) -> Self {
        self.filter_value_transform = Some(transform);
        self
    }

    pub fn with_row_value_transform(mut self, transform: RowValueTransform) -> Self {
        self.row_value_transform = Some(transform);
        self
    }

    pub fn with_order_value_transform(mut self, transform: OrderValueTransform) -> Self {
        self.order_value_transform = Some(transform);
        self
    }

    pub fn with_row_predicate(mut self, predicate: RowPredicate) -> Self {
        self.row_predicate = Some(predicate);
        self
    }

    pub fn with_row_comparator(mut self, comparator: RowComparator) -> Self {
        self.row_comparator = Some(comparator);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let field = DataField::new("name");
        assert!(field.is_enabled());
        assert!(field.is_filterable());
        assert!(field.is_orderable());
        assert!(!field.is_excluded_from_global());
        assert_eq!(field.default_operator(), Some(FilterOperator::Like));
        assert_eq!(field.value_type(), ValueType::String);
        assert_eq!(field.filtering_method(), FilteringMethod::Query);
        assert_eq!(field.ordering_method(), OrderingMethod::Query);
        assert_eq!(field.expression(), "name");
    }

    #[test]
    fn test_expression_override() {
        let field = DataField::new("last_name").with_expression("u.last_name");
        assert_eq!(field.expression(), "u.last_name");
    }

    #[test]
    fn test_global_exclusion_blocks_global_filters_only() {
        let field = DataField::new("secret").with_excluded_from_global(true);
        let global = Filter::global(FilterOperator::Like, json!("x")).unwrap();
        let scoped = Filter::for_field("secret", FilterOperator::Like, json!("x")).unwrap();
        assert!(!field.is_filter_authorized(&global));
        assert!(field.is_filter_authorized(&scoped));
    }
}
