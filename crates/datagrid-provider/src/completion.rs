//! Query completion: pushing the request into the source query.
//!
//! [`Provider::complete_query`] runs four passes over an externally built
//! [`SelectQuery`]: select terms, field-bound filters, global filters, and
//! ordering/paging. Each pass only applies the pairs routed to the query
//! layer; memory-routed pairs are left for the in-memory pipeline.

use tracing::debug;

use crate::provider::{GLOBAL_FILTER_RESULT_COLUMN, Provider};
use crate::query::{self, SelectQuery, SqlSelect};

/// Which completion passes to run. All on by default.
#[derive(Debug, Clone, Copy)]
pub struct CompleteQueryOptions {
    pub selects: bool,
    pub filters: bool,
    pub orders: bool,
    pub paging: bool,
}

impl Default for CompleteQueryOptions {
    fn default() -> Self {
        Self {
            selects: true,
            filters: true,
            orders: true,
            paging: true,
        }
    }
}

impl Provider {
    /// Complete the source query from the current request and field
    /// configuration. Records whether the paging pass pushed the window down
    /// so memory paging knows to stand down.
    pub fn complete_query(&mut self, query: &mut dyn SelectQuery, options: CompleteQueryOptions) {
        if options.selects {
            self.complete_query_selects(query);
        }
        if options.filters {
            self.complete_query_field_filters(query);
            self.complete_query_global_filters(query);
        }
        if options.orders {
            self.complete_query_orders(query);
        }
        if options.paging {
            self.complete_query_paging(query);
        }
    }

    /// Select pass: each enabled field contributes its terms, either through
    /// its select injector or as its plain expression.
    fn complete_query_selects(&self, query: &mut dyn SelectQuery) {
        for field in self.fields().enabled() {
            match field.select_injector() {
                Some(injector) => injector(field, query),
                None => query.add_select(field.expression()),
            }
        }
    }

    /// Field-filter pass: AND-apply every applicable query-routed filter.
    fn complete_query_field_filters(&self, query: &mut dyn SelectQuery) {
        for (filter, field) in self.applicable_field_filters() {
            if field.filtering_method().is_memory() {
                continue;
            }
            match field.filter_injector() {
                Some(injector) => injector(field, filter, query),
                None => {
                    query::apply_filter_to_query(filter, field, query);
                }
            }
        }
    }

    /// Global-filter pass.
    ///
    /// Query-routed (filter, field) pair conditions are collected in a side
    /// query and OR-folded. When every eligible field is query-routed, the
    /// folded condition is ANDed into the main query; when memory-routed
    /// fields participate too, the fold instead becomes a derived boolean
    /// select column so that memory filtering can reconcile both verdicts
    /// without double-filtering.
    fn complete_query_global_filters(&self, query: &mut dyn SelectQuery) {
        let globals = self.applicable_global_filters();
        if globals.is_empty() {
            return;
        }

        let mut side = SqlSelect::new("");
        for filter in &globals {
            for field in self.fields().enabled() {
                if !self.is_global_filter_eligible(field, filter)
                    || field.filtering_method().is_memory()
                {
                    continue;
                }
                match field.filter_injector() {
                    Some(injector) => injector(field, filter, &mut side),
                    None => {
                        query::apply_filter_to_query(filter, field, &mut side);
                    }
                }
            }
        }

        if side.conditions().is_empty() {
            return;
        }
        let folded = side.conditions().join(" OR ");

        if self.needs_memory_global_filtering() {
            debug!("global filtering spans both substrates; emitting derived verdict column");
            query.add_select(&format!(
                "(CASE WHEN {folded} THEN 1 ELSE 0 END) AS {GLOBAL_FILTER_RESULT_COLUMN}"
            ));
        } else {
            query.add_where(&format!("({folded})"));
        }

        for (name, value) in side.parameters() {
            query.set_parameter(name, value.clone());
        }
    }

    /// Order pass. Skipped entirely when any chain member is memory-routed:
    /// the memory pipeline then owns the whole chain, and a query-side
    /// pre-sort would be wasted work.
    fn complete_query_orders(&self, query: &mut dyn SelectQuery) {
        if self.needs_memory_ordering() {
            debug!("order chain contains memory-routed members; skipping query ordering");
            return;
        }
        for (order, field) in self.applicable_orders() {
            match field.order_injector() {
                Some(injector) => injector(field, order, query),
                None => query::apply_order_to_query(order, field, query),
            }
        }
    }

    /// Paging pass: push the requested window down to the query when one was
    /// requested and no memory processing would invalidate it.
    fn complete_query_paging(&mut self, query: &mut dyn SelectQuery) {
        let (offset, limit) = {
            let Some(input) = self.input() else {
                return;
            };
            if self.needs_memory_processing() {
                debug!("memory processing pending; keeping the full result set unpaged");
                return;
            }
            match input.paging_limit() {
                Some(limit) => (input.paging_offset(), limit),
                None => return,
            }
        };
        query.set_limit(offset, limit);
        self.set_query_paging_applied();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::FilterAuthorization;
    use crate::field::{DataField, FilteringMethod};
    use datagrid_core::types::filter::{Filter, FilterOperator};
    use datagrid_core::types::input::InputConfiguration;
    use datagrid_core::types::order::Order;
    use datagrid_core::types::row::Row;
    use serde_json::json;

    fn provider(fields: Vec<DataField>, input: InputConfiguration) -> Provider {
        let mut provider = Provider::new();
        for field in fields {
            provider.fields_mut().add(field);
        }
        provider.set_input(input);
        provider
    }

    #[test]
    fn test_field_filters_are_and_combined() {
        let mut input = InputConfiguration::new();
        input.add_filter(Filter::for_field("name", FilterOperator::Like, json!("foo")).unwrap());
        input.add_filter(Filter::for_field("status", FilterOperator::Eq, json!("open")).unwrap());
        let mut provider = provider(
            vec![DataField::new("name"), DataField::new("status")],
            input,
        );

        let mut query = SqlSelect::new("users");
        provider.complete_query(&mut query, CompleteQueryOptions::default());
        assert_eq!(query.conditions().len(), 2);
        assert!(query.sql().contains(" AND "));
    }

    #[test]
    fn test_global_filter_is_or_folded_into_where() {
        let mut input = InputConfiguration::new();
        input.add_filter(Filter::global(FilterOperator::Like, json!("smith")).unwrap());
        let mut provider = provider(vec![DataField::new("name"), DataField::new("city")], input);

        let mut query = SqlSelect::new("users");
        provider.complete_query(&mut query, CompleteQueryOptions::default());
        assert_eq!(query.conditions().len(), 1);
        let condition = &query.conditions()[0];
        assert!(condition.contains(" OR "));
        assert!(condition.starts_with('('));
        assert_eq!(query.parameters().len(), 2);
    }

    #[test]
    fn test_mixed_global_filtering_emits_verdict_column() {
        let mut input = InputConfiguration::new();
        input.add_filter(Filter::global(FilterOperator::Like, json!("smith")).unwrap());
        let mut provider = provider(
            vec![
                DataField::new("name"),
                DataField::new("nickname")
                    .with_filtering_method(FilteringMethod::MemoryAuto),
            ],
            input,
        );

        let mut query = SqlSelect::new("users");
        provider.complete_query(&mut query, CompleteQueryOptions::default());
        // no hard condition; the verdict travels as a derived column instead
        assert!(query.conditions().is_empty());
        assert!(query.sql().contains(GLOBAL_FILTER_RESULT_COLUMN));
        assert!(query.sql().contains("CASE WHEN"));
    }

    #[test]
    fn test_memory_ordering_skips_query_order_pass() {
        let mut input = InputConfiguration::new();
        input.add_order(Order::asc("name"));
        input.add_order(Order::desc("score"));
        let mut provider = provider(
            vec![
                DataField::new("name"),
                DataField::new("score")
                    .with_ordering_method(crate::field::OrderingMethod::MemoryAuto)
                    .with_authorization(FilterAuthorization::common_numeric()),
            ],
            input,
        );

        let mut query = SqlSelect::new("users");
        provider.complete_query(&mut query, CompleteQueryOptions::default());
        assert!(!query.sql().contains("ORDER BY"));
    }

    #[test]
    fn test_paging_pushed_down_only_without_memory_processing() {
        let mut input = InputConfiguration::new();
        input.set_paging(10, Some(5));
        let mut provider = provider(vec![DataField::new("name")], input.clone());
        let mut query = SqlSelect::new("users");
        provider.complete_query(&mut query, CompleteQueryOptions::default());
        assert!(query.sql().ends_with("LIMIT 5 OFFSET 10"));

        input.add_filter(Filter::for_field("score", FilterOperator::Gt, json!(1)).unwrap());
        let mut provider = self::provider(
            vec![
                DataField::new("name"),
                DataField::new("score")
                    .with_filtering_method(FilteringMethod::MemoryAuto)
                    .with_authorization(FilterAuthorization::common_numeric()),
            ],
            input,
        );
        let mut query = SqlSelect::new("users");
        provider.complete_query(&mut query, CompleteQueryOptions::default());
        assert!(!query.sql().contains("LIMIT"));
    }

    #[test]
    fn test_disabled_paging_pass_defers_window_to_memory() {
        let mut input = InputConfiguration::new();
        input.set_paging(1, Some(2));
        let mut provider = provider(vec![DataField::new("name")], input);

        let mut query = SqlSelect::new("users");
        provider.complete_query(
            &mut query,
            CompleteQueryOptions {
                paging: false,
                ..CompleteQueryOptions::default()
            },
        );
        assert!(!query.sql().contains("LIMIT"));

        for n in 0..5 {
            provider.add_row(Row::new().with_raw("name", json!(format!("r{n}"))), false);
        }
        provider.apply_paging();
        assert_eq!(provider.rows().len(), 2);
        assert_eq!(provider.rows()[0].raw_value("name"), Some(&json!("r1")));
    }
}
