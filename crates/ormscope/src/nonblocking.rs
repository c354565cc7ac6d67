//! Async facade that runs store calls on the blocking thread pool.

use ormscope_core::{
    AssociationResolver, EntityRow, FetchOptions, FindOptions, RelatedResult, ScopeSelector,
    SledStore, StoreExecutor,
};
use ormscope_proto::Value;
use tokio::task;
use tracing::debug;

use crate::database::Database;
use crate::error::Result;

/// Async wrapper around a [`Database`].
///
/// Composition runs on the calling task. Only store execution moves to
/// `spawn_blocking`; dropping a returned future abandons that call alone.
pub struct AsyncDatabase<S = SledStore> {
    inner: Database<S>,
}

impl<S> Clone for AsyncDatabase<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: StoreExecutor + 'static> AsyncDatabase<S> {
    /// Wrap a synchronous database.
    pub fn new(inner: Database<S>) -> Self {
        Self { inner }
    }

    /// The wrapped database.
    pub fn database(&self) -> &Database<S> {
        &self.inner
    }

    /// Find all rows of `entity` under `scopes`.
    pub async fn find_all(
        &self,
        entity: &str,
        scopes: &[ScopeSelector],
        options: FindOptions,
    ) -> Result<Vec<EntityRow>> {
        let plan = self
            .inner
            .model(entity)?
            .with_scopes(scopes.iter().cloned())
            .plan(&options)?;
        let store = self.inner.shared_store();

        let rows = task::spawn_blocking(move || store.execute(&plan)).await??;
        debug!(entity, rows = rows.len(), "find_all");
        Ok(rows)
    }

    /// Find the first matching row.
    pub async fn find_one(
        &self,
        entity: &str,
        scopes: &[ScopeSelector],
        options: FindOptions,
    ) -> Result<Option<EntityRow>> {
        let rows = self.find_all(entity, scopes, options.with_limit(1)).await?;
        Ok(rows.into_iter().next())
    }

    /// Find the row of `entity` whose identity is `id`.
    pub async fn find_by_id(
        &self,
        entity: &str,
        scopes: &[ScopeSelector],
        id: impl Into<Value>,
    ) -> Result<Option<EntityRow>> {
        let options = self
            .inner
            .model(entity)?
            .with_scopes(scopes.iter().cloned())
            .by_id_options(id.into())?;
        self.find_one(entity, scopes, options).await
    }

    /// Fetch the rows of `association` linked to `instance`.
    pub async fn fetch_related(
        &self,
        instance: &EntityRow,
        association: &str,
        options: FetchOptions,
    ) -> Result<RelatedResult> {
        let fetch = self.inner.plan_fetch(instance, association, &options)?;
        let store = self.inner.shared_store();

        let related =
            task::spawn_blocking(move || AssociationResolver::execute(store.as_ref(), &fetch))
                .await??;
        Ok(related)
    }
}
