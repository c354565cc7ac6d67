//! The store boundary: materialized rows and the executor trait.

use ormscope_proto::Value;
use serde::Serialize;

use crate::error::StoreError;
use crate::query::QueryPlan;

/// A materialized entity row with its eagerly loaded associations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityRow {
    /// Entity name.
    pub entity: String,
    /// Column values.
    pub fields: Vec<(String, Value)>,
    /// Included rows per association alias, in join order.
    pub related: Vec<(String, Vec<EntityRow>)>,
}

impl EntityRow {
    /// Create a row without related rows.
    pub fn new(entity: impl Into<String>, fields: Vec<(String, Value)>) -> Self {
        Self {
            entity: entity.into(),
            fields,
            related: Vec::new(),
        }
    }

    /// Get a column value.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Get the rows included for an association.
    pub fn related(&self, association: &str) -> Option<&[EntityRow]> {
        self.related
            .iter()
            .find(|(alias, _)| alias == association)
            .map(|(_, rows)| rows.as_slice())
    }

    /// Get the single row included for a singleton association.
    pub fn related_one(&self, association: &str) -> Option<&EntityRow> {
        self.related(association).and_then(|rows| rows.first())
    }
}

/// Executes query plans against a store.
///
/// Implementations receive fully qualified plans and must not reinterpret
/// scopes; all scope semantics are already folded into the plan.
pub trait StoreExecutor: Send + Sync {
    /// Execute a plan, returning root rows with their included rows
    /// attached under each join's association alias.
    fn execute(&self, plan: &QueryPlan) -> Result<Vec<EntityRow>, StoreError>;
}

impl<T: StoreExecutor + ?Sized> StoreExecutor for std::sync::Arc<T> {
    fn execute(&self, plan: &QueryPlan) -> Result<Vec<EntityRow>, StoreError> {
        (**self).execute(plan)
    }
}

impl<T: StoreExecutor + ?Sized> StoreExecutor for &T {
    fn execute(&self, plan: &QueryPlan) -> Result<Vec<EntityRow>, StoreError> {
        (**self).execute(plan)
    }
}
