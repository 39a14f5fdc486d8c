//! The in-memory row pipeline: filtering, multi-key ordering, paging.
//!
//! Only memory-routed (filter, field) pairs are evaluated here; query-routed
//! pairs were already folded into the source query during completion. For
//! global filters the query-side verdict stamped at ingestion is reconciled
//! with the memory-side evaluation so a row is never filtered twice.

use std::cmp::Ordering;
use std::mem;

use serde_json::Value;
use tracing::{debug, warn};

use datagrid_core::types::filter::{Filter, FilterOperator};
use datagrid_core::types::order::{Order, SortDirection};
use datagrid_core::types::row::Row;

use crate::field::{DataField, FilteringMethod, OrderingMethod};
use crate::provider::{META_GLOBAL_FILTER_ACCEPTED, Provider};

/// The memory-routed pairs of one request, resolved once per filtering pass
/// instead of per row.
struct FilterPlan<'a> {
    field_pairs: Vec<(&'a Filter, &'a DataField)>,
    global_pairs: Vec<(&'a Filter, &'a DataField)>,
}

impl FilterPlan<'_> {
    fn is_empty(&self) -> bool {
        self.field_pairs.is_empty() && self.global_pairs.is_empty()
    }
}

impl Provider {
    /// Whether a row passes the current request's memory filtering.
    ///
    /// Field-bound filters are conjunctive. Global filters are disjunctive
    /// across eligible memory-routed fields, pre-accepted by a query-side
    /// verdict when one was stamped at ingestion.
    pub fn check_filtering(&self, row: &Row) -> bool {
        self.row_passes(&self.filter_plan(), row)
    }

    fn filter_plan(&self) -> FilterPlan<'_> {
        let field_pairs = self
            .applicable_field_filters()
            .into_iter()
            .filter(|(_, field)| field.filtering_method().is_memory())
            .collect();

        let mut global_pairs = Vec::new();
        for filter in self.applicable_global_filters() {
            for field in self.fields().enabled() {
                if self.is_global_filter_eligible(field, filter)
                    && field.filtering_method().is_memory()
                {
                    global_pairs.push((filter, field));
                }
            }
        }

        FilterPlan {
            field_pairs,
            global_pairs,
        }
    }

    fn row_passes(&self, plan: &FilterPlan<'_>, row: &Row) -> bool {
        for (filter, field) in &plan.field_pairs {
            if !self.memory_pair_passes(filter, field, row) {
                return false;
            }
        }

        if row.metadata(META_GLOBAL_FILTER_ACCEPTED) == Some(&Value::Bool(true)) {
            return true;
        }

        if !plan.global_pairs.is_empty()
            && !plan
                .global_pairs
                .iter()
                .any(|(filter, field)| self.memory_pair_passes(filter, field, row))
        {
            return false;
        }

        true
    }

    /// Evaluate one memory-routed (filter, field) pair against a row.
    fn memory_pair_passes(&self, filter: &Filter, field: &DataField, row: &Row) -> bool {
        let extracted = row
            .value_for_processing(field.name())
            .cloned()
            .unwrap_or(Value::Null);
        let value = match field.row_value_transform() {
            Some(transform) => transform(field, &extracted, row),
            None => extracted,
        };

        if field.filtering_method() == FilteringMethod::MemoryCustom {
            match field.row_predicate() {
                Some(predicate) => return predicate(field, filter, &value, row),
                None => warn!(
                    field = field.name(),
                    "memory-custom filtering without a row predicate; using native evaluation"
                ),
            }
        }

        let operator = match filter.operator() {
            FilterOperator::Auto => match field.default_operator() {
                Some(op) => op,
                // an unresolvable AUTO filter matches nothing
                None => {
                    warn!(
                        field = field.name(),
                        "AUTO filter on a field without a default operator; rejecting row"
                    );
                    return false;
                }
            },
            op => op,
        };

        Filter::evaluate(operator, filter.value(), &value, field.value_type())
    }

    /// Run memory filtering over the buffered rows.
    ///
    /// Records the filtered count only when memory filtering actually ran or
    /// when no count was recorded yet; a count reported by a query-routed
    /// source (its count-query result) is left untouched.
    pub fn apply_filters(&mut self) {
        let rows = mem::take(self.rows_mut());
        let before = rows.len();
        let plan = self.filter_plan();
        let memory_filtering = !plan.is_empty();
        let kept: Vec<Row> = rows
            .into_iter()
            .filter(|r| self.row_passes(&plan, r))
            .collect();
        debug!(before, after = kept.len(), "memory filtering applied");
        if memory_filtering || !self.has_filtered_rows_count() {
            self.set_filtered_rows_count(kept.len() as u64);
        }
        *self.rows_mut() = kept;
    }

    /// Run the full order chain in memory when any chain member is
    /// memory-routed. A stable sort keeps the source order of fully tied
    /// rows.
    pub fn apply_orders(&mut self) {
        if !self.needs_memory_ordering() {
            return;
        }

        let chain: Vec<(Order, String)> = self
            .applicable_orders()
            .into_iter()
            .map(|(order, field)| (order.clone(), field.name().to_string()))
            .collect();
        if chain.is_empty() {
            return;
        }

        // decorate each row with its sort keys once, transforms included
        let rows = mem::take(self.rows_mut());
        let mut decorated: Vec<(Vec<Value>, Row)> = rows
            .into_iter()
            .map(|row| {
                let keys = chain
                    .iter()
                    .map(|(_, field_name)| {
                        let extracted = row
                            .value_for_processing(field_name)
                            .cloned()
                            .unwrap_or(Value::Null);
                        match self.fields().get(field_name) {
                            Some(field) => match field.order_value_transform() {
                                Some(transform) => transform(field, &extracted),
                                None => extracted,
                            },
                            None => extracted,
                        }
                    })
                    .collect();
                (keys, row)
            })
            .collect();

        decorated.sort_by(|(a, _), (b, _)| self.compare_keys(&chain, a, b));
        *self.rows_mut() = decorated.into_iter().map(|(_, row)| row).collect();
    }

    /// Lexicographic comparison along the tie-break chain; the first
    /// non-equal member decides.
    fn compare_keys(&self, chain: &[(Order, String)], a: &[Value], b: &[Value]) -> Ordering {
        for (index, (order, field_name)) in chain.iter().enumerate() {
            let (ka, kb) = (&a[index], &b[index]);
            let field = self.fields().get(field_name);

            let custom = field.and_then(|f| {
                if f.ordering_method() == OrderingMethod::MemoryCustom {
                    f.row_comparator().map(|c| (f, c))
                } else {
                    None
                }
            });
            let ordering = match custom {
                // a custom comparator handles direction itself
                Some((field, comparator)) => comparator(field, order, ka, kb),
                None => {
                    let value_type = field.map(|f| f.value_type()).unwrap_or_default();
                    let natural = value_type.compare(ka, kb).unwrap_or(Ordering::Equal);
                    match order.direction {
                        SortDirection::Asc => natural,
                        SortDirection::Desc => natural.reverse(),
                    }
                }
            };

            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// Apply the requested paging window in memory.
    ///
    /// A no-op without a limit, or when the completion paging pass already
    /// pushed the window down to the query.
    pub fn apply_paging(&mut self) {
        if self.query_paging_applied() {
            return;
        }
        let Some(input) = self.input() else {
            return;
        };
        let Some(limit) = input.paging_limit() else {
            return;
        };
        let offset = input.paging_offset() as usize;
        let rows = mem::take(self.rows_mut());
        *self.rows_mut() = rows
            .into_iter()
            .skip(offset)
            .take(limit as usize)
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::authorization::FilterAuthorization;
    use crate::field::{FilteringMethod, OrderingMethod};
    use datagrid_core::types::input::InputConfiguration;
    use datagrid_core::types::value::ValueType;
    use serde_json::json;

    fn provider(fields: Vec<DataField>, input: InputConfiguration) -> Provider {
        let mut provider = Provider::new();
        for field in fields {
            provider.fields_mut().add(field);
        }
        provider.set_input(input);
        provider
    }

    fn memory_number_field(name: &str) -> DataField {
        DataField::new(name)
            .with_value_type(ValueType::Number)
            .with_authorization(FilterAuthorization::common_numeric())
            .with_filtering_method(FilteringMethod::MemoryAuto)
            .with_ordering_method(OrderingMethod::MemoryAuto)
    }

    #[test]
    fn test_field_filters_are_conjunctive() {
        let mut input = InputConfiguration::new();
        input.add_filter(Filter::for_field("age", FilterOperator::Gt, json!(10)).unwrap());
        input.add_filter(Filter::for_field("age", FilterOperator::Lt, json!(20)).unwrap());
        let mut provider = provider(vec![memory_number_field("age")], input);

        for age in [5, 15, 25] {
            provider.add_row(Row::new().with_raw("age", json!(age)), false);
        }
        provider.apply_filters();
        assert_eq!(provider.rows().len(), 1);
        assert_eq!(provider.rows()[0].raw_value("age"), Some(&json!(15)));
        assert_eq!(provider.filtered_rows_count(), 1);
    }

    #[test]
    fn test_global_filter_is_disjunctive_across_fields() {
        let mut input = InputConfiguration::new();
        input.add_filter(Filter::global(FilterOperator::Like, json!("bar")).unwrap());
        let mut provider = provider(
            vec![
                DataField::new("name").with_filtering_method(FilteringMethod::MemoryAuto),
                DataField::new("city").with_filtering_method(FilteringMethod::MemoryAuto),
            ],
            input,
        );

        provider.add_row(
            Row::new()
                .with_raw("name", json!("foo"))
                .with_raw("city", json!("Barcelona")),
            false,
        );
        provider.add_row(
            Row::new()
                .with_raw("name", json!("baz"))
                .with_raw("city", json!("Oslo")),
            false,
        );
        provider.apply_filters();
        assert_eq!(provider.rows().len(), 1);
        assert_eq!(
            provider.rows()[0].raw_value("city"),
            Some(&json!("Barcelona"))
        );
    }

    #[test]
    fn test_query_side_verdict_pre_accepts_row() {
        let mut input = InputConfiguration::new();
        input.add_filter(Filter::global(FilterOperator::Like, json!("zzz")).unwrap());
        let mut provider = provider(
            vec![DataField::new("name").with_filtering_method(FilteringMethod::MemoryAuto)],
            input,
        );

        let mut accepted = Row::new().with_raw("name", json!("foo"));
        accepted.set_metadata(META_GLOBAL_FILTER_ACCEPTED, Value::Bool(true));
        let rejected = Row::new().with_raw("name", json!("foo"));

        assert!(provider.check_filtering(&accepted));
        assert!(!provider.check_filtering(&rejected));
    }

    #[test]
    fn test_custom_row_predicate_overrides_native_evaluation() {
        let mut input = InputConfiguration::new();
        input.add_filter(Filter::for_field("name", FilterOperator::Like, json!("x")).unwrap());
        let mut provider = provider(
            vec![
                DataField::new("name")
                    .with_filtering_method(FilteringMethod::MemoryCustom)
                    .with_row_predicate(Arc::new(|_, _, value, _| {
                        value.as_str().is_some_and(|s| s.len() > 3)
                    })),
            ],
            input,
        );

        provider.add_row(Row::new().with_raw("name", json!("long enough")), false);
        provider.add_row(Row::new().with_raw("name", json!("no")), false);
        provider.apply_filters();
        assert_eq!(provider.rows().len(), 1);
    }

    #[test]
    fn test_memory_auto_routing_ignores_configured_row_predicate() {
        let mut input = InputConfiguration::new();
        input.add_filter(Filter::for_field("name", FilterOperator::Like, json!("foo")).unwrap());
        let mut provider = provider(
            vec![
                DataField::new("name")
                    .with_filtering_method(FilteringMethod::MemoryAuto)
                    // must not be consulted under auto routing
                    .with_row_predicate(Arc::new(|_, _, _, _| false)),
            ],
            input,
        );

        provider.add_row(Row::new().with_raw("name", json!("foo")), false);
        provider.apply_filters();
        assert_eq!(provider.rows().len(), 1);
    }

    #[test]
    fn test_memory_auto_routing_ignores_configured_comparator() {
        let mut input = InputConfiguration::new();
        input.add_order(Order::asc("name"));
        let mut provider = provider(
            vec![
                DataField::new("name")
                    .with_ordering_method(OrderingMethod::MemoryAuto)
                    .with_row_comparator(Arc::new(|_, _, _, _| Ordering::Equal)),
            ],
            input,
        );

        for name in ["b", "a"] {
            provider.add_row(Row::new().with_raw("name", json!(name)), false);
        }
        provider.apply_orders();
        let names: Vec<&str> = provider
            .rows()
            .iter()
            .map(|r| r.raw_value("name").unwrap().as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_multi_key_ordering_with_tie_break() {
        let mut input = InputConfiguration::new();
        input.add_order(Order::asc("group"));
        input.add_order(Order::desc("score"));
        let mut provider = provider(
            vec![
                DataField::new("group").with_ordering_method(OrderingMethod::MemoryAuto),
                memory_number_field("score"),
            ],
            input,
        );

        for (group, score) in [("b", 1), ("a", 2), ("a", 9), ("b", 5)] {
            provider.add_row(
                Row::new()
                    .with_raw("group", json!(group))
                    .with_raw("score", json!(score)),
                false,
            );
        }
        provider.apply_orders();
        let observed: Vec<(String, i64)> = provider
            .rows()
            .iter()
            .map(|r| {
                (
                    r.raw_value("group").unwrap().as_str().unwrap().to_string(),
                    r.raw_value("score").unwrap().as_i64().unwrap(),
                )
            })
            .collect();
        assert_eq!(
            observed,
            vec![
                ("a".into(), 9),
                ("a".into(), 2),
                ("b".into(), 5),
                ("b".into(), 1)
            ]
        );
    }

    #[test]
    fn test_sort_is_stable_for_tied_keys() {
        let mut input = InputConfiguration::new();
        input.add_order(Order::asc("group"));
        let mut provider = provider(
            vec![
                DataField::new("group").with_ordering_method(OrderingMethod::MemoryAuto),
                DataField::new("id"),
            ],
            input,
        );

        for (group, id) in [("a", 1), ("a", 2), ("a", 3)] {
            provider.add_row(
                Row::new()
                    .with_raw("group", json!(group))
                    .with_raw("id", json!(id)),
                false,
            );
        }
        provider.apply_orders();
        let ids: Vec<i64> = provider
            .rows()
            .iter()
            .map(|r| r.raw_value("id").unwrap().as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_custom_comparator_owns_direction() {
        let mut input = InputConfiguration::new();
        input.add_order(Order::desc("name"));
        let mut provider = provider(
            vec![
                DataField::new("name")
                    .with_ordering_method(OrderingMethod::MemoryCustom)
                    // sorts by string length, ignoring the requested direction
                    .with_row_comparator(Arc::new(|_, _, a, b| {
                        let len = |v: &Value| v.as_str().map(str::len).unwrap_or(0);
                        len(a).cmp(&len(b))
                    })),
            ],
            input,
        );

        for name in ["ccc", "a", "bb"] {
            provider.add_row(Row::new().with_raw("name", json!(name)), false);
        }
        provider.apply_orders();
        let names: Vec<&str> = provider
            .rows()
            .iter()
            .map(|r| r.raw_value("name").unwrap().as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a", "bb", "ccc"]);
    }

    #[test]
    fn test_memory_paging_window() {
        let mut input = InputConfiguration::new();
        input.set_paging(10, Some(5));
        input.add_filter(Filter::for_field("n", FilterOperator::Gte, json!(0)).unwrap());
        let mut provider = provider(vec![memory_number_field("n")], input);

        for n in 0..25 {
            provider.add_row(Row::new().with_raw("n", json!(n)), false);
        }
        provider.apply_filters();
        provider.apply_paging();
        let ns: Vec<i64> = provider
            .rows()
            .iter()
            .map(|r| r.raw_value("n").unwrap().as_i64().unwrap())
            .collect();
        assert_eq!(ns, (10..15).collect::<Vec<_>>());
    }

    #[test]
    fn test_paging_without_limit_keeps_everything() {
        let mut input = InputConfiguration::new();
        input.set_paging(10, None);
        input.add_filter(Filter::for_field("n", FilterOperator::Gte, json!(0)).unwrap());
        let mut provider = provider(vec![memory_number_field("n")], input);
        for n in 0..25 {
            provider.add_row(Row::new().with_raw("n", json!(n)), false);
        }
        provider.apply_paging();
        assert_eq!(provider.rows().len(), 25);
    }
}
