//! The field registry.

use indexmap::IndexMap;

use crate::field::DataField;

/// An insertion-ordered collection of fields, keyed by name. Registration
/// order is the order in which filters and select completion are applied.
#[derive(Debug, Default)]
pub struct FieldRegistry {
    fields: IndexMap<String, DataField>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a field; replaces any previous field with the same name.
    pub fn add(&mut self, field: DataField) -> &mut Self {
        self.fields.insert(field.name().to_string(), field);
        self
    }

    pub fn get(&self, name: &str) -> Option<&DataField> {
        self.fields.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut DataField> {
        self.fields.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// All fields, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &DataField> {
        self.fields.values()
    }

    /// Enabled fields, in registration order.
    pub fn enabled(&self) -> impl Iterator<Item = &DataField> {
        self.fields.values().filter(|f| f.is_enabled())
    }

    pub fn enable_all(&mut self) {
        for field in self.fields.values_mut() {
            field.set_enabled(true);
        }
    }

    pub fn disable_all(&mut self) {
        for field in self.fields.values_mut() {
            field.set_enabled(false);
        }
    }
}
