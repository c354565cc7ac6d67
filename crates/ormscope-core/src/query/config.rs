//! Planner configuration.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Default maximum nesting depth of includes.
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 8;

/// How a call-site `where` on an include combines with the target's
/// inherited scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncludeWhere {
    /// The `where` replaces the captured or default scope of the target,
    /// but merges onto scopes named on the include itself.
    #[default]
    Replace,
    /// The `where` always merges onto whatever scope applies.
    Merge,
}

/// Configuration of the query planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Combination of include `where` with inherited scopes.
    pub include_where: IncludeWhere,
    /// Maximum nesting depth of includes (1 = top-level only).
    pub max_include_depth: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            include_where: IncludeWhere::default(),
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
        }
    }
}

impl PlannerConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the include `where` policy.
    pub fn with_include_where(mut self, policy: IncludeWhere) -> Self {
        self.include_where = policy;
        self
    }

    /// Set the maximum include depth.
    pub fn with_max_include_depth(mut self, depth: usize) -> Self {
        self.max_include_depth = depth;
        self
    }

    /// Parse a configuration from JSON. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }
}
