//! Model catalog for ormscope.
//!
//! The catalog stores entity definitions, their default and named scopes,
//! and the associations between them.

mod association;
mod catalog;
mod entity;
mod field;
mod scope;

pub use association::{AssociationDef, AssociationKind, JunctionDef};
pub use catalog::{Catalog, CatalogBuilder, EntityType};
pub use entity::EntityDef;
pub use field::{FieldDef, ScalarType};
pub use scope::{ScopeDefinition, ScopeFn, ScopeRegistry, ScopeSelector, ScopeSpec, DEFAULT_SCOPE};
