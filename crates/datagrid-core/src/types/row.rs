//! The result row container.

use std::collections::HashMap;

use serde_json::{Map, Value};

/// Presentation annotation kinds. One annotation per kind is kept on a row,
/// last write wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresentationKind {
    /// Combobox/select rendering hints.
    Select,
}

/// A keyed front-end presentation annotation.
#[derive(Debug, Clone, PartialEq)]
pub enum Presentation {
    /// Combobox/select rendering hints.
    Select {
        /// Whether the option is rendered disabled.
        disabled: bool,
    },
}

impl Presentation {
    /// The kind under which this annotation is stored.
    pub fn kind(&self) -> PresentationKind {
        match self {
            Self::Select { .. } => PresentationKind::Select,
        }
    }
}

/// One result record.
///
/// Carries two parallel value maps: "raw" values drive in-memory filtering
/// and sorting, "formatted" values are what the client sees. Either side may
/// be absent per field; the processing/output accessors fall back to the
/// other map.
#[derive(Debug, Clone, Default)]
pub struct Row {
    raw_values: Map<String, Value>,
    formatted_values: Map<String, Value>,
    source: Option<Value>,
    metadata: HashMap<String, Value>,
    presentations: HashMap<PresentationKind, Presentation>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a row bound to a materialized source record.
    pub fn from_source(source: Value) -> Self {
        Self {
            source: Some(source),
            ..Self::default()
        }
    }

    /// Set a raw value (chainable, for row construction).
    pub fn with_raw(mut self, field: impl Into<String>, value: Value) -> Self {
        self.raw_values.insert(field.into(), value);
        self
    }

    /// Set a formatted value (chainable, for row construction).
    pub fn with_formatted(mut self, field: impl Into<String>, value: Value) -> Self {
        self.formatted_values.insert(field.into(), value);
        self
    }

    /// The raw value map.
    pub fn raw_values(&self) -> &Map<String, Value> {
        &self.raw_values
    }

    /// Look up a raw value.
    pub fn raw_value(&self, field: &str) -> Option<&Value> {
        self.raw_values.get(field)
    }

    /// Set a raw value.
    pub fn set_raw_value(&mut self, field: impl Into<String>, value: Value) -> &mut Self {
        self.raw_values.insert(field.into(), value);
        self
    }

    /// The formatted value map.
    pub fn formatted_values(&self) -> &Map<String, Value> {
        &self.formatted_values
    }

    /// Look up a formatted value.
    pub fn formatted_value(&self, field: &str) -> Option<&Value> {
        self.formatted_values.get(field)
    }

    /// Set a formatted value.
    pub fn set_formatted_value(&mut self, field: impl Into<String>, value: Value) -> &mut Self {
        self.formatted_values.insert(field.into(), value);
        self
    }

    /// The originating source record, if any.
    pub fn source(&self) -> Option<&Value> {
        self.source.as_ref()
    }

    /// Bind the originating source record.
    pub fn set_source(&mut self, source: Value) -> &mut Self {
        self.source = Some(source);
        self
    }

    /// Look up a metadata entry.
    pub fn metadata(&self, name: &str) -> Option<&Value> {
        self.metadata.get(name)
    }

    /// Set a metadata entry.
    pub fn set_metadata(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        self.metadata.insert(name.into(), value);
        self
    }

    /// Look up a presentation annotation by kind.
    pub fn presentation(&self, kind: PresentationKind) -> Option<&Presentation> {
        self.presentations.get(&kind)
    }

    /// Attach a presentation annotation; replaces any existing annotation of
    /// the same kind.
    pub fn set_presentation(&mut self, presentation: Presentation) -> &mut Self {
        self.presentations.insert(presentation.kind(), presentation);
        self
    }

    /// The value used for in-memory filtering and sorting: raw when present
    /// and non-null, formatted otherwise.
    pub fn value_for_processing(&self, field: &str) -> Option<&Value> {
        match self.raw_values.get(field) {
            Some(v) if !v.is_null() => Some(v),
            _ => self.formatted_values.get(field),
        }
    }

    /// The value sent to the client: formatted when present and non-null,
    /// raw otherwise.
    pub fn value_for_output(&self, field: &str) -> Option<&Value> {
        match self.formatted_values.get(field) {
            Some(v) if !v.is_null() => Some(v),
            _ => self.raw_values.get(field),
        }
    }

    /// All output values: raw values overlaid with formatted ones.
    pub fn values_for_output(&self) -> Map<String, Value> {
        let mut values = self.raw_values.clone();
        for (field, value) in &self.formatted_values {
            values.insert(field.clone(), value.clone());
        }
        values
    }

    /// Drop entries from both value maps for which the predicate is false.
    pub fn retain_fields<F: FnMut(&str) -> bool>(&mut self, mut keep: F) {
        self.raw_values.retain(|field, _| keep(field));
        self.formatted_values.retain(|field, _| keep(field));
    }
}
