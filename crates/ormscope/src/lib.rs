//! ormscope - scoped queries over an object-relational catalog.
//!
//! Define entity types, scopes and associations once in a [`Catalog`],
//! bind it to a store, and query through scoped models:
//!
//! ```ignore
//! use ormscope::{Catalog, Database, FetchOptions, FindOptions, IncludeSpec};
//!
//! let db = Database::temporary(catalog)?;
//! let companies = db
//!     .model("company")?
//!     .scope("users")
//!     .find_all(FindOptions::new().include(IncludeSpec::model("project")))?;
//!
//! for company in &companies {
//!     let users = db.fetch_related(company, "users", FetchOptions::unscoped())?;
//!     println!("{} users", users.len());
//! }
//! ```
//!
//! # Feature Flags
//!
//! - `async`: [`AsyncDatabase`], which runs store calls on tokio's blocking pool

mod database;
mod error;
#[cfg(feature = "async")]
mod nonblocking;

pub use database::{Database, ScopedModel};
pub use error::{Error, Result};
#[cfg(feature = "async")]
pub use nonblocking::AsyncDatabase;

pub use ormscope_core::{
    AssociationDef, AssociationKind, Catalog, CatalogBuilder, EntityDef, EntityRow, FetchOptions,
    FetchPlan, FieldDef, FindOptions, IncludeSpec, IncludeWhere, JunctionDef, PlannerConfig,
    QueryPlan, RelatedResult, ScalarType, ScopeArgsError, ScopeDefinition, ScopeSelector,
    ScopeSpec, SledStore, StoreConfig, StoreError, StoreExecutor,
};

/// Re-export protocol types.
pub use ormscope_proto as proto;
