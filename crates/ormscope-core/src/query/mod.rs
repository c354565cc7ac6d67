//! Query composition for ormscope.
//!
//! This module turns scopes, includes and call-site options into fully
//! qualified plans, and resolves lazy association fetches.

mod config;
mod explain;
mod filter;
mod include;
mod planner;
mod resolver;

pub use config::{IncludeWhere, PlannerConfig, DEFAULT_MAX_INCLUDE_DEPTH};
pub use filter::{Bindings, FilterEvaluator};
pub use include::{FetchOptions, FindOptions, IncludeSet, IncludeSpec};
pub use planner::{JoinPlan, JunctionJoin, QueryPlan, QueryPlanner, ThroughPlan, PATH_SEPARATOR};
pub use resolver::{AssociationResolver, FetchPlan, RelatedResult};
