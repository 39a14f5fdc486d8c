//! Envelope construction and sparse field selection.
//!
//! The provider renders its processed rows into a normalized JSON envelope.
//! Two shapes are supported: the grid shape (`data`) and the combobox shape
//! (`results`, with per-option `disabled` flags). Output values are pruned
//! against the request's required-data selectors before rendering.

use serde_json::{Map, Value, json};

use datagrid_core::selector::SelectorSet;
use datagrid_core::types::row::{Presentation, PresentationKind, Row};

use crate::provider::Provider;

/// Fields always kept in output, regardless of selectors.
const ALWAYS_KEPT_FIELDS: &[&str] = &["id"];

/// The envelope shape to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Grid/table envelope: rows under `data`.
    #[default]
    Grid,
    /// Combobox envelope: rows under `results`, with `disabled` flags.
    Select,
}

impl Provider {
    /// The effective selector set: the request's selectors when present, the
    /// provider default otherwise.
    pub fn selector_set(&self) -> SelectorSet {
        let selectors = self
            .input()
            .and_then(|input| input.required_data_selectors())
            .unwrap_or_else(|| self.default_required_data_selectors());
        SelectorSet::new(selectors)
    }

    /// Strip a row's value maps down to the selected fields (plus the
    /// always-kept whitelist). Disabled registered fields are dropped
    /// unconditionally.
    pub fn clean_row(&self, row: &mut Row) {
        let selectors = self.selector_set();
        row.retain_fields(|field| {
            if self.is_field_disabled(field) {
                return false;
            }
            ALWAYS_KEPT_FIELDS.contains(&field) || selectors.is_data_required(field)
        });
    }

    fn is_field_disabled(&self, name: &str) -> bool {
        self.fields().get(name).is_some_and(|f| !f.is_enabled())
    }

    /// Render the envelope for the processed rows.
    ///
    /// `recordsTotal` is `null` when the source never reported a total;
    /// `recordsFiltered` is the post-filtering, pre-paging count.
    pub fn formatted_output(&self, format: OutputFormat) -> Value {
        let selectors = self.selector_set();

        let rows: Vec<Value> = self
            .rows()
            .iter()
            .map(|row| {
                let mut values = row.values_for_output();
                values.retain(|field, _| !self.is_field_disabled(field));
                let mut values = prune_map(values, &selectors, "");
                if format == OutputFormat::Select
                    && let Some(Presentation::Select { disabled: true }) =
                        row.presentation(PresentationKind::Select)
                {
                    values.insert("disabled".to_string(), Value::Bool(true));
                }
                Value::Object(values)
            })
            .collect();

        let rows_key = match format {
            OutputFormat::Grid => "data",
            OutputFormat::Select => "results",
        };

        json!({
            "userData": Value::Object(self.user_output_data().clone()),
            "recordsTotal": match self.total_rows_count() {
                Some(total) => json!(total),
                None => Value::Null,
            },
            "recordsFiltered": self.filtered_rows_count(),
            rows_key: rows,
        })
    }
}

/// Prune one object level against the selectors. `prefix` is the `@`-joined
/// scope path of this level; nested objects recurse one scope deeper.
fn prune_map(values: Map<String, Value>, selectors: &SelectorSet, prefix: &str) -> Map<String, Value> {
    let mut pruned = Map::new();
    for (field, value) in values {
        let path = if prefix.is_empty() {
            field.clone()
        } else {
            format!("{prefix}@{field}")
        };

        if prefix.is_empty() && ALWAYS_KEPT_FIELDS.contains(&field.as_str()) {
            pruned.insert(field, value);
            continue;
        }

        match value {
            Value::Object(nested) => {
                if selectors.is_any_data_required_in_scope(&path) {
                    let nested = prune_map(nested, selectors, &path);
                    pruned.insert(field, Value::Object(nested));
                }
            }
            other => {
                if selectors.is_data_required(&path) {
                    pruned.insert(field, other);
                }
            }
        }
    }
    pruned
}
