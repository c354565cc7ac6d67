//! Synchronous database handle and scoped models.

use std::sync::Arc;

use ormscope_core::{
    AssociationResolver, Catalog, EntityRow, FetchOptions, FetchPlan, FindOptions, PlannerConfig,
    QueryPlan, QueryPlanner, RelatedResult, ScopeSelector, SledStore, StoreConfig, StoreExecutor,
};
use ormscope_proto::{Filter, Value};
use tracing::{debug, instrument};

use crate::error::Result;

/// A catalog bound to a store.
///
/// Cloning is cheap: the catalog and store are shared.
pub struct Database<S = SledStore> {
    catalog: Arc<Catalog>,
    store: Arc<S>,
    config: PlannerConfig,
}

impl<S> Clone for Database<S> {
    fn clone(&self) -> Self {
        Self {
            catalog: Arc::clone(&self.catalog),
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl Database<SledStore> {
    /// Open a sled-backed database.
    pub fn open(catalog: Catalog, config: StoreConfig) -> Result<Self> {
        let store = SledStore::open(config)?;
        Ok(Self::with_store(catalog, store))
    }

    /// Open a temporary sled-backed database.
    pub fn temporary(catalog: Catalog) -> Result<Self> {
        let store = SledStore::temporary()?;
        Ok(Self::with_store(catalog, store))
    }

    /// Insert a row into `entity`'s table.
    pub fn insert<K: Into<String>>(
        &self,
        entity: &str,
        values: impl IntoIterator<Item = (K, Value)>,
    ) -> Result<EntityRow> {
        let def = self.catalog.entity(entity)?.def();
        Ok(self.store.insert(def, values)?)
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<usize> {
        Ok(self.store.flush()?)
    }
}

impl<S: StoreExecutor> Database<S> {
    /// Bind a catalog to an existing store.
    pub fn with_store(catalog: Catalog, store: S) -> Self {
        Self::from_shared(Arc::new(catalog), Arc::new(store))
    }

    /// Bind shared handles.
    pub fn from_shared(catalog: Arc<Catalog>, store: Arc<S>) -> Self {
        Self {
            catalog,
            store,
            config: PlannerConfig::default(),
        }
    }

    /// Replace the planner configuration.
    pub fn with_config(mut self, config: PlannerConfig) -> Self {
        self.config = config;
        self
    }

    /// The catalog.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The planner configuration.
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    #[cfg(feature = "async")]
    pub(crate) fn shared_store(&self) -> Arc<S> {
        Arc::clone(&self.store)
    }

    fn planner(&self) -> QueryPlanner<'_> {
        QueryPlanner::with_config(&self.catalog, self.config.clone())
    }

    fn resolver(&self) -> AssociationResolver<'_> {
        AssociationResolver::with_config(&self.catalog, self.config.clone())
    }

    /// A model for `entity` with its default scope active.
    pub fn model(&self, entity: &str) -> Result<ScopedModel<'_, S>> {
        self.catalog.entity(entity)?;
        Ok(ScopedModel {
            db: self,
            entity: entity.to_string(),
            scopes: Vec::new(),
        })
    }

    /// Plan a lazy fetch of `association` for `instance`.
    pub fn plan_fetch(
        &self,
        instance: &EntityRow,
        association: &str,
        options: &FetchOptions,
    ) -> Result<FetchPlan> {
        Ok(self.resolver().plan_fetch(instance, association, options)?)
    }

    /// Fetch the rows of `association` linked to `instance`.
    #[instrument(skip(self, instance, options), fields(entity = %instance.entity))]
    pub fn fetch_related(
        &self,
        instance: &EntityRow,
        association: &str,
        options: FetchOptions,
    ) -> Result<RelatedResult> {
        let fetch = self.plan_fetch(instance, association, &options)?;
        let related = AssociationResolver::execute(self.store.as_ref(), &fetch)?;
        debug!(association, rows = related.len(), "fetched related rows");
        Ok(related)
    }
}

/// An entity type with an active scope selection.
///
/// Models are values: selecting a scope returns a new model and leaves the
/// original untouched.
pub struct ScopedModel<'d, S = SledStore> {
    db: &'d Database<S>,
    entity: String,
    scopes: Vec<ScopeSelector>,
}

impl<S> Clone for ScopedModel<'_, S> {
    fn clone(&self) -> Self {
        Self {
            db: self.db,
            entity: self.entity.clone(),
            scopes: self.scopes.clone(),
        }
    }
}

impl<'d, S: StoreExecutor> ScopedModel<'d, S> {
    /// Entity name.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Active scope selection; empty means the default scope.
    pub fn scopes(&self) -> &[ScopeSelector] {
        &self.scopes
    }

    /// Select a single scope, replacing the current selection.
    pub fn scope(&self, selector: impl Into<ScopeSelector>) -> Self {
        self.with_scopes([selector.into()])
    }

    /// Select several scopes, merged left to right.
    pub fn with_scopes<I>(&self, selectors: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<ScopeSelector>,
    {
        Self {
            db: self.db,
            entity: self.entity.clone(),
            scopes: selectors.into_iter().map(Into::into).collect(),
        }
    }

    /// Drop every scope, including the default one.
    pub fn unscoped(&self) -> Self {
        self.scope(ScopeSelector::Unscoped)
    }

    /// Compose the plan a find with `options` would run.
    pub fn plan(&self, options: &FindOptions) -> Result<QueryPlan> {
        Ok(self.db.planner().plan(&self.entity, &self.scopes, options)?)
    }

    /// Find all matching rows.
    pub fn find_all(&self, options: FindOptions) -> Result<Vec<EntityRow>> {
        let plan = self.plan(&options)?;
        let rows = self.db.store.execute(&plan)?;
        debug!(entity = %self.entity, rows = rows.len(), "find_all");
        Ok(rows)
    }

    /// Find the first matching row.
    pub fn find_one(&self, options: FindOptions) -> Result<Option<EntityRow>> {
        Ok(self.find_all(options.with_limit(1))?.into_iter().next())
    }

    /// Find the row whose identity is `id`, within the active scope.
    pub fn find_by_id(&self, id: impl Into<Value>) -> Result<Option<EntityRow>> {
        self.find_one(self.by_id_options(id.into())?)
    }

    pub(crate) fn by_id_options(&self, id: Value) -> Result<FindOptions> {
        let identity = &self.db.catalog.entity(&self.entity)?.def().identity_field;
        Ok(FindOptions::new().with_where(Filter::new().eq(identity.as_str(), id)))
    }
}
