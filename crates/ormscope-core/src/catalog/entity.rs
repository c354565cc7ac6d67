//! Entity definitions.

use super::field::{FieldDef, ScalarType};
use serde::Serialize;

/// An entity definition (table schema).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityDef {
    /// Entity name (unique within the catalog).
    pub name: String,
    /// Table the entity is stored in; also the root alias of its queries.
    pub table: String,
    /// Name of the primary identity field.
    pub identity_field: String,
    /// Attribute definitions.
    pub fields: Vec<FieldDef>,
}

impl EntityDef {
    /// Create an entity with an integer `id` identity and a table named
    /// after the entity.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            table: name.clone(),
            name,
            identity_field: "id".to_string(),
            fields: vec![FieldDef::new("id", ScalarType::Int64)],
        }
    }

    /// Store the entity in a differently named table.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Use another identity field. The field must also be declared.
    pub fn with_identity(mut self, identity_field: impl Into<String>) -> Self {
        let identity_field = identity_field.into();
        self.fields.retain(|f| f.name != self.identity_field);
        self.identity_field = identity_field;
        self
    }

    /// Add an attribute, replacing one with the same name.
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.retain(|f| f.name != field.name);
        self.fields.push(field);
        self
    }

    /// Add several attributes.
    pub fn with_fields(self, fields: impl IntoIterator<Item = FieldDef>) -> Self {
        fields.into_iter().fold(self, |entity, field| entity.with_field(field))
    }

    /// Get an attribute by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check whether the entity declares an attribute.
    pub fn has_field(&self, name: &str) -> bool {
        self.get_field(name).is_some()
    }
}
