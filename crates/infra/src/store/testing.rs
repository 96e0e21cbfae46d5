//! Store wrapper with one collection that can be taken down and restored.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use campus_core::{EntityId, TenantId};

use super::{DocumentStore, Filter, InMemoryDocumentStore, StoreError, Update};

/// Reads and bulk writes on `broken` fail while the collection is down.
/// Single-record writes always pass through so fixtures can be seeded.
pub(crate) struct BrokenCollection {
    inner: InMemoryDocumentStore,
    broken: &'static str,
    down: AtomicBool,
}

impl BrokenCollection {
    pub(crate) fn new(broken: &'static str) -> Self {
        Self {
            inner: InMemoryDocumentStore::new(),
            broken,
            down: AtomicBool::new(true),
        }
    }

    pub(crate) fn heal(&self) {
        self.down.store(false, Ordering::SeqCst);
    }

    fn check(&self, collection: &str) -> Result<(), StoreError> {
        if collection == self.broken && self.down.load(Ordering::SeqCst) {
            Err(StoreError::Backend(format!("{collection} unavailable")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for BrokenCollection {
    async fn get(&self, t: TenantId, c: &str, id: EntityId) -> Result<Option<Value>, StoreError> {
        self.check(c)?;
        self.inner.get(t, c, id).await
    }
    async fn find(&self, t: TenantId, c: &str, f: &Filter) -> Result<Vec<Value>, StoreError> {
        self.check(c)?;
        self.inner.find(t, c, f).await
    }
    async fn count(&self, t: TenantId, c: &str, f: &Filter) -> Result<u64, StoreError> {
        self.check(c)?;
        self.inner.count(t, c, f).await
    }
    async fn insert(&self, t: TenantId, c: &str, id: EntityId, d: Value) -> Result<(), StoreError> {
        self.inner.insert(t, c, id, d).await
    }
    async fn upsert_unique(&self, t: TenantId, c: &str, id: EntityId, d: Value, u: &Filter) -> Result<(), StoreError> {
        self.inner.upsert_unique(t, c, id, d, u).await
    }
    async fn replace(&self, t: TenantId, c: &str, id: EntityId, d: Value) -> Result<bool, StoreError> {
        self.inner.replace(t, c, id, d).await
    }
    async fn update_many(&self, t: TenantId, c: &str, f: &Filter, u: &Update) -> Result<u64, StoreError> {
        self.check(c)?;
        self.inner.update_many(t, c, f, u).await
    }
    async fn delete(&self, t: TenantId, c: &str, id: EntityId) -> Result<bool, StoreError> {
        self.inner.delete(t, c, id).await
    }
    async fn delete_many(&self, t: TenantId, c: &str, f: &Filter) -> Result<u64, StoreError> {
        self.check(c)?;
        self.inner.delete_many(t, c, f).await
    }
}
