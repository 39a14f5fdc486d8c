//! The provider: engine state and resolution logic.
//!
//! A [`Provider`] holds the field registry, the parsed request, the row
//! buffer and the result counts. A [`GridSource`] supplies the fields and
//! the rows; the provider resolves which filters/orders apply, routes each
//! to the query layer or memory, and runs the in-memory pipeline.

use serde_json::{Map, Value};
use tracing::{debug, info};

use datagrid_core::GridResult;
use datagrid_core::types::filter::Filter;
use datagrid_core::types::input::InputConfiguration;
use datagrid_core::types::order::Order;
use datagrid_core::types::row::Row;

use crate::field::DataField;
use crate::registry::FieldRegistry;

/// Derived boolean column carrying the query-side global-filter verdict when
/// global filtering spans both substrates.
pub const GLOBAL_FILTER_RESULT_COLUMN: &str = "global_filter_result";

/// Row metadata key under which the query-side verdict is stamped at
/// ingestion.
pub const META_GLOBAL_FILTER_ACCEPTED: &str = "global_filter_accepted";

/// A data source pluggable into the engine.
pub trait GridSource {
    /// Register the exposed fields.
    fn configure(&self, fields: &mut FieldRegistry);

    /// Execute the (completed) source query and feed rows into the provider
    /// via [`Provider::add_row`]. Also expected to set the total row count
    /// when known.
    fn generate_rows(&mut self, provider: &mut Provider) -> GridResult<()>;
}

/// Engine state for one request/response cycle.
#[derive(Debug, Default)]
pub struct Provider {
    fields: FieldRegistry,
    input: Option<InputConfiguration>,
    rows: Vec<Row>,
    total_rows_count: Option<u64>,
    filtered_rows_count: Option<u64>,
    query_paging_applied: bool,
    default_required_data_selectors: Vec<String>,
    user_output_data: Map<String, Value>,
}

impl Provider {
    pub fn new() -> Self {
        Self {
            default_required_data_selectors: vec!["**".to_string()],
            ..Self::default()
        }
    }

    /// A provider with the source's fields already registered.
    pub fn configured(source: &impl GridSource) -> Self {
        let mut provider = Self::new();
        source.configure(&mut provider.fields);
        provider
    }

    /// Run one full cycle: let the source generate rows, then apply the
    /// memory pipeline (filtering, ordering, paging).
    pub fn run(&mut self, source: &mut impl GridSource) -> GridResult<()> {
        source.generate_rows(self)?;
        info!(
            rows = self.rows.len(),
            "source rows ingested; running memory pipeline"
        );
        self.apply_filters();
        self.apply_orders();
        self.apply_paging();
        Ok(())
    }

    /// Parse and install the raw wire payload as the current request.
    pub fn read_raw_input(&mut self, raw: &Value) -> &mut Self {
        self.set_input(InputConfiguration::from_raw(raw))
    }

    /// Install a parsed request.
    pub fn set_input(&mut self, input: InputConfiguration) -> &mut Self {
        self.input = Some(input);
        self
    }

    /// The current request, if one was installed.
    pub fn input(&self) -> Option<&InputConfiguration> {
        self.input.as_ref()
    }

    pub fn fields(&self) -> &FieldRegistry {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut FieldRegistry {
        &mut self.fields
    }

    /// The current row buffer.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub(crate) fn rows_mut(&mut self) -> &mut Vec<Row> {
        &mut self.rows
    }

    /// The pre-paging matching-row count over the whole source, when known.
    pub fn total_rows_count(&self) -> Option<u64> {
        self.total_rows_count
    }

    /// Record the pre-paging matching-row count (typically from a count
    /// query).
    pub fn set_total_rows_count(&mut self, count: u64) -> &mut Self {
        self.total_rows_count = Some(count);
        self
    }

    /// The pre-paging count of rows matching all filters (0 when never
    /// recorded).
    pub fn filtered_rows_count(&self) -> u64 {
        self.filtered_rows_count.unwrap_or(0)
    }

    /// Record the pre-paging matching-row count. Query-routed sources report
    /// it from their count query; memory filtering never overwrites an
    /// explicitly recorded count.
    pub fn set_filtered_rows_count(&mut self, count: u64) -> &mut Self {
        self.filtered_rows_count = Some(count);
        self
    }

    pub(crate) fn has_filtered_rows_count(&self) -> bool {
        self.filtered_rows_count.is_some()
    }

    /// Whether the completion paging pass pushed the window down to the
    /// query; memory paging is skipped in that case.
    pub(crate) fn query_paging_applied(&self) -> bool {
        self.query_paging_applied
    }

    pub(crate) fn set_query_paging_applied(&mut self) {
        self.query_paging_applied = true;
    }

    /// The selectors used when the request carries none.
    pub fn default_required_data_selectors(&self) -> &[String] {
        &self.default_required_data_selectors
    }

    pub fn set_default_required_data_selectors(&mut self, selectors: Vec<String>) -> &mut Self {
        self.default_required_data_selectors = selectors;
        self
    }

    /// Free-form data echoed back to the client in the envelope.
    pub fn user_output_data(&self) -> &Map<String, Value> {
        &self.user_output_data
    }

    pub fn set_user_output_value(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.user_output_data.insert(key.into(), value);
        self
    }

    /// Ingest one row.
    ///
    /// Stamps the query-side global-filter verdict from the row's source
    /// record (a bare `true`, or a truthy derived column) into row metadata,
    /// then, when `auto_filter` is set, immediately runs memory filtering
    /// and drops the row on rejection. Returns whether the row was kept.
    pub fn add_row(&mut self, mut row: Row, auto_filter: bool) -> bool {
        if let Some(accepted) = Self::query_side_global_verdict(&row) {
            row.set_metadata(META_GLOBAL_FILTER_ACCEPTED, Value::Bool(accepted));
        }

        if auto_filter && !self.check_filtering(&row) {
            debug!("row rejected by memory filtering at ingestion");
            return false;
        }

        self.rows.push(row);
        true
    }

    /// Read the derived global-filter column off the source record.
    fn query_side_global_verdict(row: &Row) -> Option<bool> {
        let source = row.source()?;
        // a scalar source record is itself the verdict
        if let Value::Bool(b) = source {
            return Some(*b);
        }
        let value = source.as_object()?.get(GLOBAL_FILTER_RESULT_COLUMN)?;
        Some(match value {
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_i64() == Some(1),
            Value::String(s) => s == "1",
            _ => false,
        })
    }

    /// Drop all rows and counts, keeping fields and input.
    pub fn reset_rows(&mut self) -> &mut Self {
        self.rows.clear();
        self.total_rows_count = None;
        self.filtered_rows_count = None;
        self
    }

    /// Field-bound filters that will actually be applied: the target field
    /// exists, is enabled and filterable, and authorizes the filter.
    /// Request arrival order is preserved.
    pub fn applicable_field_filters(&self) -> Vec<(&Filter, &DataField)> {
        let Some(input) = &self.input else {
            return Vec::new();
        };
        input
            .filters()
            .iter()
            .filter(|f| !f.is_global())
            .filter_map(|filter| {
                let name = filter.field_name()?;
                let field = self.fields.get(name)?;
                if field.is_enabled() && field.is_filterable() && field.is_filter_authorized(filter)
                {
                    Some((filter, field))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Global filters with at least one eligible field.
    pub fn applicable_global_filters(&self) -> Vec<&Filter> {
        let Some(input) = &self.input else {
            return Vec::new();
        };
        input
            .global_filters()
            .into_iter()
            .filter(|filter| {
                self.fields
                    .enabled()
                    .any(|field| self.is_global_filter_eligible(field, filter))
            })
            .collect()
    }

    /// Whether a (field, global filter) pair participates in global
    /// filtering.
    pub fn is_global_filter_eligible(&self, field: &DataField, filter: &Filter) -> bool {
        field.is_filterable()
            && field.is_filter_authorized(filter)
            && filter.is_field_in_scope(field.name())
    }

    /// Orders that will actually be applied: the target field exists, is
    /// enabled and orderable. Chain order is preserved.
    pub fn applicable_orders(&self) -> Vec<(&Order, &DataField)> {
        let Some(input) = &self.input else {
            return Vec::new();
        };
        input
            .orders()
            .iter()
            .filter_map(|order| {
                let field = self.fields.get(&order.field)?;
                if field.is_enabled() && field.is_orderable() {
                    Some((order, field))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Whether any applicable field-bound filter resolves in memory.
    pub fn needs_memory_field_filtering(&self) -> bool {
        self.applicable_field_filters()
            .iter()
            .any(|(_, field)| field.filtering_method().is_memory())
    }

    /// Whether any applicable (global filter, eligible field) pair resolves
    /// in memory.
    pub fn needs_memory_global_filtering(&self) -> bool {
        self.applicable_global_filters().iter().any(|filter| {
            self.fields.enabled().any(|field| {
                self.is_global_filter_eligible(field, filter)
                    && field.filtering_method().is_memory()
            })
        })
    }

    pub fn needs_memory_filtering(&self) -> bool {
        self.needs_memory_field_filtering() || self.needs_memory_global_filtering()
    }

    /// Whether the order chain must resolve in memory. One memory-routed
    /// member pulls the whole chain into memory, since a partial query-side
    /// sort cannot be refined stably afterwards.
    pub fn needs_memory_ordering(&self) -> bool {
        self.applicable_orders()
            .iter()
            .any(|(_, field)| field.ordering_method().is_memory())
    }

    pub fn needs_memory_processing(&self) -> bool {
        self.needs_memory_filtering() || self.needs_memory_ordering()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FilteringMethod, OrderingMethod};
    use datagrid_core::types::filter::FilterOperator;
    use serde_json::json;

    fn provider_with_fields(fields: Vec<DataField>) -> Provider {
        let mut provider = Provider::new();
        for field in fields {
            provider.fields_mut().add(field);
        }
        provider
    }

    #[test]
    fn test_filters_on_unknown_or_disabled_fields_are_not_applicable() {
        let mut provider = provider_with_fields(vec![
            DataField::new("name"),
            DataField::new("hidden").with_enabled(false),
        ]);
        let mut input = InputConfiguration::new();
        input.add_filter(Filter::for_field("name", FilterOperator::Like, json!("x")).unwrap());
        input.add_filter(Filter::for_field("hidden", FilterOperator::Like, json!("x")).unwrap());
        input.add_filter(Filter::for_field("ghost", FilterOperator::Like, json!("x")).unwrap());
        provider.set_input(input);

        let applicable = provider.applicable_field_filters();
        assert_eq!(applicable.len(), 1);
        assert_eq!(applicable[0].1.name(), "name");
    }

    #[test]
    fn test_global_filter_without_eligible_field_is_not_applicable() {
        let mut provider = provider_with_fields(vec![
            DataField::new("secret").with_excluded_from_global(true),
        ]);
        let mut input = InputConfiguration::new();
        input.add_filter(Filter::global(FilterOperator::Like, json!("x")).unwrap());
        provider.set_input(input);
        assert!(provider.applicable_global_filters().is_empty());
    }

    #[test]
    fn test_memory_routing_predicates() {
        let mut provider = provider_with_fields(vec![
            DataField::new("name"),
            DataField::new("score")
                .with_filtering_method(FilteringMethod::MemoryAuto)
                .with_ordering_method(OrderingMethod::MemoryAuto)
                .with_authorization(crate::FilterAuthorization::common_numeric()),
        ]);
        let mut input = InputConfiguration::new();
        input.add_filter(Filter::for_field("name", FilterOperator::Like, json!("x")).unwrap());
        input.add_order(Order::asc("name"));
        provider.set_input(input);

        assert!(!provider.needs_memory_filtering());
        assert!(!provider.needs_memory_ordering());

        let mut input = InputConfiguration::new();
        input.add_filter(Filter::for_field("score", FilterOperator::Gt, json!(3)).unwrap());
        input.add_order(Order::asc("name"));
        input.add_order(Order::desc("score"));
        provider.set_input(input);

        assert!(provider.needs_memory_field_filtering());
        // one memory member pulls the whole chain into memory
        assert!(provider.needs_memory_ordering());
    }

    #[test]
    fn test_no_input_means_nothing_applicable() {
        let provider = provider_with_fields(vec![DataField::new("name")]);
        assert!(provider.applicable_field_filters().is_empty());
        assert!(provider.applicable_global_filters().is_empty());
        assert!(provider.applicable_orders().is_empty());
        assert!(!provider.needs_memory_processing());
    }

    #[test]
    fn test_add_row_stamps_query_side_verdict() {
        let mut provider = provider_with_fields(vec![DataField::new("name")]);
        let row = Row::from_source(json!({ GLOBAL_FILTER_RESULT_COLUMN: "1" }));
        provider.add_row(row, false);
        let row = Row::from_source(json!({ GLOBAL_FILTER_RESULT_COLUMN: 0 }));
        provider.add_row(row, false);
        let row = Row::from_source(Value::Bool(true));
        provider.add_row(row, false);

        assert_eq!(
            provider.rows()[0].metadata(META_GLOBAL_FILTER_ACCEPTED),
            Some(&Value::Bool(true))
        );
        assert_eq!(
            provider.rows()[1].metadata(META_GLOBAL_FILTER_ACCEPTED),
            Some(&Value::Bool(false))
        );
        assert_eq!(
            provider.rows()[2].metadata(META_GLOBAL_FILTER_ACCEPTED),
            Some(&Value::Bool(true))
        );
    }

    #[test]
    fn test_add_row_auto_filter_drops_rejected_rows() {
        let mut provider = provider_with_fields(vec![
            DataField::new("name").with_filtering_method(FilteringMethod::MemoryAuto),
        ]);
        let mut input = InputConfiguration::new();
        input.add_filter(Filter::for_field("name", FilterOperator::Like, json!("keep")).unwrap());
        provider.set_input(input);

        assert!(provider.add_row(Row::new().with_raw("name", json!("keep me")), true));
        assert!(!provider.add_row(Row::new().with_raw("name", json!("drop me")), true));
        assert_eq!(provider.rows().len(), 1);
    }

    #[test]
    fn test_reset_rows() {
        let mut provider = Provider::new();
        provider.add_row(Row::new(), false);
        provider.set_total_rows_count(10);
        provider.reset_rows();
        assert!(provider.rows().is_empty());
        assert_eq!(provider.total_rows_count(), None);
        assert_eq!(provider.filtered_rows_count(), 0);
    }
}
