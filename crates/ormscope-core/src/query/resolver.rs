//! Lazy association fetches from a loaded instance.
//!
//! A fetch resolves the target scope (explicit selector, else the scope the
//! association captured, else the target default), constrains the target to
//! rows linked to the instance, and plans the result with the regular
//! [`QueryPlanner`].

use ormscope_proto::Filter;
use serde::Serialize;
use tracing::{debug, instrument};

use super::config::PlannerConfig;
use super::include::{FetchOptions, FindOptions};
use super::planner::{merge_at, QueryPlan, QueryPlanner, ThroughRequest};
use crate::catalog::{AssociationKind, Catalog};
use crate::error::Error;
use crate::storage::{EntityRow, StoreExecutor};

/// A planned association fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchPlan {
    /// Association alias.
    pub association: String,
    /// Association kind.
    pub kind: AssociationKind,
    /// Query for the related rows; `None` when the instance's key is null
    /// and nothing can match.
    pub query: Option<QueryPlan>,
}

impl FetchPlan {
    /// Whether the fetch yields at most one row.
    pub fn is_singleton(&self) -> bool {
        self.kind.is_singleton()
    }
}

/// Result of an association fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum RelatedResult {
    /// Singleton association; absent is not an error.
    One(Option<EntityRow>),
    /// Collection association.
    Many(Vec<EntityRow>),
}

impl RelatedResult {
    /// The single row, or the first row of a collection.
    pub fn one(self) -> Option<EntityRow> {
        match self {
            RelatedResult::One(row) => row,
            RelatedResult::Many(rows) => rows.into_iter().next(),
        }
    }

    /// All rows.
    pub fn into_rows(self) -> Vec<EntityRow> {
        match self {
            RelatedResult::One(row) => row.into_iter().collect(),
            RelatedResult::Many(rows) => rows,
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        match self {
            RelatedResult::One(row) => usize::from(row.is_some()),
            RelatedResult::Many(rows) => rows.len(),
        }
    }

    /// Check whether nothing was found.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolves association fetches against the catalog.
#[derive(Debug, Clone)]
pub struct AssociationResolver<'a> {
    catalog: &'a Catalog,
    planner: QueryPlanner<'a>,
}

impl<'a> AssociationResolver<'a> {
    /// Create a resolver with the default planner configuration.
    pub fn new(catalog: &'a Catalog) -> Self {
        Self::with_config(catalog, PlannerConfig::default())
    }

    /// Create a resolver with a custom planner configuration.
    pub fn with_config(catalog: &'a Catalog, config: PlannerConfig) -> Self {
        Self {
            catalog,
            planner: QueryPlanner::with_config(catalog, config),
        }
    }

    /// Plan the fetch of `association` from `instance`.
    #[instrument(skip(self, instance, options), fields(entity = %instance.entity))]
    pub fn plan_fetch(
        &self,
        instance: &EntityRow,
        association: &str,
        options: &FetchOptions,
    ) -> Result<FetchPlan, Error> {
        let def = self.catalog.association(&instance.entity, association)?;
        let active = match &options.scope {
            Some(selector) => self.catalog.resolve_scope(&def.target, selector)?,
            None => self.catalog.resolve_scopes(&def.target, &def.target_scope)?,
        };

        let key = instance
            .get(&def.source_key)
            .ok_or_else(|| Error::MissingKey {
                entity: instance.entity.clone(),
                column: def.source_key.clone(),
            })?;

        let mut fetch = FetchPlan {
            association: def.alias.clone(),
            kind: def.kind,
            query: None,
        };
        if key.is_null() {
            debug!(association, "null key, nothing to fetch");
            return Ok(fetch);
        }

        let mut find = FindOptions {
            filter: options.filter.clone(),
            includes: Vec::new(),
            order: options.order.clone(),
            limit: if def.is_singleton() { Some(1) } else { options.limit },
            offset: None,
        };

        let query = match &def.through {
            Some(junction) => {
                let through = ThroughRequest {
                    junction,
                    root_key: &def.target_key,
                    value: key.clone(),
                };
                self.planner.compose(&def.target, &active, &find, Some(through))?
            }
            None => {
                // The key constraint is applied last so it cannot be overridden.
                let linked = Filter::new().eq(def.target_key.as_str(), key.clone());
                let table = &self.catalog.entity(&def.target)?.def().table;
                find.filter = Some(match &find.filter {
                    Some(call_site) => merge_at(call_site, &linked, table),
                    None => linked,
                });
                self.planner.compose(&def.target, &active, &find, None)?
            }
        };

        fetch.query = Some(query);
        Ok(fetch)
    }

    /// Fetch the rows of `association` linked to `instance`.
    pub fn fetch_related<S: StoreExecutor + ?Sized>(
        &self,
        store: &S,
        instance: &EntityRow,
        association: &str,
        options: &FetchOptions,
    ) -> Result<RelatedResult, Error> {
        let fetch = self.plan_fetch(instance, association, options)?;
        Self::execute(store, &fetch)
    }

    /// Execute a planned fetch.
    pub fn execute<S: StoreExecutor + ?Sized>(
        store: &S,
        fetch: &FetchPlan,
    ) -> Result<RelatedResult, Error> {
        let rows = match &fetch.query {
            Some(plan) => store.execute(plan)?,
            None => Vec::new(),
        };

        Ok(if fetch.is_singleton() {
            RelatedResult::One(rows.into_iter().next())
        } else {
            RelatedResult::Many(rows)
        })
    }
}
