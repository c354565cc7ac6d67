//! ormscope core - catalog, scope resolution, query planning and the
//! reference store.
//!
//! This crate composes default scopes, named scopes, includes and
//! call-site options into fully qualified query plans.

pub mod catalog;
pub mod error;
pub mod query;
pub mod storage;

#[cfg(test)]
mod test_support;

pub use catalog::{
    AssociationDef, AssociationKind, Catalog, CatalogBuilder, EntityDef, EntityType, FieldDef,
    JunctionDef, ScalarType, ScopeDefinition, ScopeRegistry, ScopeSelector, ScopeSpec,
    DEFAULT_SCOPE,
};
pub use error::{Error, ScopeArgsError, StoreError};
pub use query::{
    AssociationResolver, FetchOptions, FetchPlan, FindOptions, IncludeSet, IncludeSpec,
    IncludeWhere, JoinPlan, PlannerConfig, QueryPlan, QueryPlanner, RelatedResult,
};
pub use storage::{EntityRow, SledStore, StoreConfig, StoreExecutor};

/// Re-export protocol types.
pub use ormscope_proto as proto;
