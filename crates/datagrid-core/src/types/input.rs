//! The parsed client request.

use serde_json::{Map, Value};

use crate::types::filter::{Filter, FilterKind};
use crate::types::order::Order;

/// The validated form of one client request: filters (field-bound and
/// global, in arrival order), the sort tie-break chain, the paging window,
/// free-form parameters and optional field-selection selectors.
#[derive(Debug, Clone, Default)]
pub struct InputConfiguration {
    filters: Vec<Filter>,
    orders: Vec<Order>,
    paging_offset: u64,
    paging_limit: Option<u64>,
    parameters: Map<String, Value>,
    required_data_selectors: Option<Vec<String>>,
}

impl InputConfiguration {
    /// Create an empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the raw wire payload.
    ///
    /// Expected shape:
    /// ```json
    /// {
    ///   "filters": {
    ///     "by_field": { "status": [ { "operator": "LIKE", "value": "open" } ] },
    ///     "global": [ { "operator": "LIKE", "value": "smith" } ]
    ///   },
    ///   "orders": [ { "field": "name", "dir": "asc" } ],
    ///   "paging_offset": "0",
    ///   "paging_limit": "10",
    ///   "custom_parameters": { "widget_id": "1430124617236" },
    ///   "required_data": [ "user@name" ]
    /// }
    /// ```
    /// Malformed entries are silently dropped; this never fails.
    pub fn from_raw(raw: &Value) -> Self {
        let mut input = Self::new();
        let Some(root) = raw.as_object() else {
            return input;
        };

        if let Some(filters) = root.get("filters").and_then(Value::as_object) {
            if let Some(by_field) = filters.get("by_field").and_then(Value::as_object) {
                for (field_name, entries) in by_field {
                    let Some(entries) = entries.as_array() else {
                        continue;
                    };
                    for entry in entries {
                        if let Some(filter) =
                            Filter::from_raw(FilterKind::ForField(field_name.clone()), entry)
                        {
                            input.filters.push(filter);
                        }
                    }
                }
            }
            if let Some(globals) = filters.get("global").and_then(Value::as_array) {
                for entry in globals {
                    if let Some(filter) = Filter::from_raw(FilterKind::Global, entry) {
                        input.filters.push(filter);
                    }
                }
            }
        }

        if let Some(orders) = root.get("orders").and_then(Value::as_array) {
            for entry in orders {
                if let Some(order) = Order::from_raw(entry) {
                    input.orders.push(order);
                }
            }
        }

        if let Some(params) = root.get("custom_parameters").and_then(Value::as_object) {
            input.parameters = params.clone();
        }

        if let Some(limit) = root.get("paging_limit").and_then(as_count) {
            input.paging_limit = Some(limit);
        }
        if let Some(offset) = root.get("paging_offset").and_then(as_count) {
            input.paging_offset = offset;
        }

        if let Some(selectors) = root.get("required_data").and_then(Value::as_array) {
            input.required_data_selectors = Some(
                selectors
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect(),
            );
        }

        input
    }

    /// All filters, in arrival order.
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Field-bound filters targeting the named field, in arrival order.
    pub fn filters_for_field(&self, field_name: &str) -> Vec<&Filter> {
        self.filters
            .iter()
            .filter(|f| f.field_name() == Some(field_name))
            .collect()
    }

    /// Global filters, in arrival order.
    pub fn global_filters(&self) -> Vec<&Filter> {
        self.filters.iter().filter(|f| f.is_global()).collect()
    }

    /// Append a filter.
    pub fn add_filter(&mut self, filter: Filter) -> &mut Self {
        self.filters.push(filter);
        self
    }

    /// The sort tie-break chain, in arrival order.
    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    /// Append an order to the tie-break chain.
    pub fn add_order(&mut self, order: Order) -> &mut Self {
        self.orders.push(order);
        self
    }

    /// The paging offset (0 when unspecified).
    pub fn paging_offset(&self) -> u64 {
        self.paging_offset
    }

    /// The paging limit, if any. Absent means unlimited.
    pub fn paging_limit(&self) -> Option<u64> {
        self.paging_limit
    }

    /// Whether a paging limit was requested.
    pub fn has_paging_limit(&self) -> bool {
        self.paging_limit.is_some()
    }

    /// Set the paging window.
    pub fn set_paging(&mut self, offset: u64, limit: Option<u64>) -> &mut Self {
        self.paging_offset = offset;
        self.paging_limit = limit;
        self
    }

    /// Look up a free-form parameter.
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    /// All free-form parameters.
    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    /// Set a free-form parameter.
    pub fn set_parameter(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        self.parameters.insert(name.into(), value);
        self
    }

    /// Client-requested field selectors overriding the provider default.
    pub fn required_data_selectors(&self) -> Option<&[String]> {
        self.required_data_selectors.as_deref()
    }

    /// Override the required-data selectors.
    pub fn set_required_data_selectors(&mut self, selectors: Vec<String>) -> &mut Self {
        self.required_data_selectors = Some(selectors);
        self
    }
}

/// Read a non-negative count from a JSON number or numeric string.
fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}
