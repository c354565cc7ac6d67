//! Core error types.

use thiserror::Error;

/// Composition errors, plus store failures passed through unchanged.
///
/// Every variant except [`Error::Store`] is raised before the store is
/// touched and indicates a schema or call-site mistake.
#[derive(Debug, Error)]
pub enum Error {
    /// Entity type not present in the catalog.
    #[error("unknown entity '{0}'")]
    UnknownEntity(String),

    /// Named scope not defined on the entity.
    #[error("unknown scope '{scope}' on entity '{entity}'")]
    UnknownScope { entity: String, scope: String },

    /// Include or fetch referenced an alias the entity does not declare.
    #[error("unknown association '{association}' on entity '{entity}'")]
    UnknownAssociation { entity: String, association: String },

    /// A model-only include matched more than one association.
    #[error("include of '{target}' on entity '{entity}' is ambiguous: {candidates:?}")]
    AmbiguousAssociation {
        entity: String,
        target: String,
        candidates: Vec<String>,
    },

    /// Include named a model that is not the association's target.
    #[error("association '{association}' targets '{expected}', not '{found}'")]
    IncludeTargetMismatch {
        association: String,
        expected: String,
        found: String,
    },

    /// Include tree nested deeper than the planner allows.
    #[error("include path '{path}' exceeds maximum depth {max_depth}")]
    IncludeTooDeep { path: String, max_depth: usize },

    /// Parameterized scope rejected its arguments.
    #[error("invalid arguments for scope '{scope}' on entity '{entity}': {source}")]
    InvalidScopeArgs {
        entity: String,
        scope: String,
        #[source]
        source: ScopeArgsError,
    },

    /// Catalog definition is inconsistent.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// Filter or order references a table alias not bound where it is
    /// evaluated.
    #[error("column {column} references alias '{alias}', which is not bound at {bound:?}")]
    UnknownAlias {
        column: String,
        alias: String,
        bound: Vec<String>,
    },

    /// Instance lacks the key column an association fetch needs.
    #[error("instance of '{entity}' has no value for key column '{column}'")]
    MissingKey { entity: String, column: String },

    /// Store execution failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Configuration could not be parsed.
    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),

    /// Plan could not be encoded as JSON.
    #[error("plan serialization failed: {0}")]
    PlanSerialization(#[source] serde_json::Error),
}

/// Error returned by a parameterized scope for unusable arguments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ScopeArgsError(pub String);

impl ScopeArgsError {
    /// Wrong number of arguments.
    pub fn arity(expected: usize, got: usize) -> Self {
        Self(format!("expected {} argument(s), got {}", expected, got))
    }

    /// Any other argument problem.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors raised by a store executor.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Row encoding failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Row decoding failed.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// A column reference names no table bound at that point of the plan.
    #[error("column {column} is not bound to any table in scope")]
    UnboundColumn { column: String },

    /// Row cannot be stored.
    #[error("invalid row for '{table}': {reason}")]
    InvalidRow { table: String, reason: String },
}
