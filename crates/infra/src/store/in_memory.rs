use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde_json::Value;

use campus_core::{EntityId, TenantId};

use super::{DocumentStore, Filter, StoreError, Update};

type Collections = HashMap<(TenantId, String), BTreeMap<EntityId, Value>>;

/// In-memory tenant-isolated document store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    inner: RwLock<Collections>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Collections>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Backend("document store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Collections>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Backend("document store lock poisoned".to_string()))
    }
}

fn key(tenant_id: TenantId, collection: &str) -> (TenantId, String) {
    (tenant_id, collection.to_string())
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, tenant_id: TenantId, collection: &str, id: EntityId) -> Result<Option<Value>, StoreError> {
        let map = self.read()?;
        Ok(map.get(&key(tenant_id, collection)).and_then(|docs| docs.get(&id)).cloned())
    }

    async fn find(&self, tenant_id: TenantId, collection: &str, filter: &Filter) -> Result<Vec<Value>, StoreError> {
        let map = self.read()?;
        Ok(map
            .get(&key(tenant_id, collection))
            .map(|docs| docs.values().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default())
    }

    async fn count(&self, tenant_id: TenantId, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let map = self.read()?;
        Ok(map
            .get(&key(tenant_id, collection))
            .map(|docs| docs.values().filter(|d| filter.matches(d)).count() as u64)
            .unwrap_or(0))
    }

    async fn insert(&self, tenant_id: TenantId, collection: &str, id: EntityId, doc: Value) -> Result<(), StoreError> {
        let mut map = self.write()?;
        let docs = map.entry(key(tenant_id, collection)).or_default();
        if docs.contains_key(&id) {
            return Err(StoreError::AlreadyExists {
                collection: collection.to_string(),
                id,
            });
        }
        docs.insert(id, doc);
        Ok(())
    }

    async fn upsert_unique(
        &self,
        tenant_id: TenantId,
        collection: &str,
        id: EntityId,
        doc: Value,
        unique: &Filter,
    ) -> Result<(), StoreError> {
        // Check and write under the same write guard so concurrent callers serialize.
        let mut map = self.write()?;
        let docs = map.entry(key(tenant_id, collection)).or_default();
        if docs.iter().any(|(other, d)| *other != id && unique.matches(d)) {
            return Err(StoreError::Duplicate(format!("{collection} already holds a matching record")));
        }
        docs.insert(id, doc);
        Ok(())
    }

    async fn replace(&self, tenant_id: TenantId, collection: &str, id: EntityId, doc: Value) -> Result<bool, StoreError> {
        let mut map = self.write()?;
        match map.get_mut(&key(tenant_id, collection)).and_then(|docs| docs.get_mut(&id)) {
            Some(slot) => {
                *slot = doc;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_many(
        &self,
        tenant_id: TenantId,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<u64, StoreError> {
        let mut map = self.write()?;
        let Some(docs) = map.get_mut(&key(tenant_id, collection)) else {
            return Ok(0);
        };

        let mut changed = 0;
        for doc in docs.values_mut().filter(|d| filter.matches(d)) {
            if update.apply(doc) {
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn delete(&self, tenant_id: TenantId, collection: &str, id: EntityId) -> Result<bool, StoreError> {
        let mut map = self.write()?;
        Ok(map
            .get_mut(&key(tenant_id, collection))
            .is_some_and(|docs| docs.remove(&id).is_some()))
    }

    async fn delete_many(&self, tenant_id: TenantId, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let mut map = self.write()?;
        let Some(docs) = map.get_mut(&key(tenant_id, collection)) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|_, d| !filter.matches(d));
        Ok((before - docs.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn tenants_never_see_each_others_documents() {
        let store = InMemoryDocumentStore::new();
        let (a, b) = (TenantId::new(), TenantId::new());
        let id = EntityId::new();

        store.insert(a, "subjects", id, json!({ "name": "Physics" })).await.unwrap();

        assert!(store.get(b, "subjects", id).await.unwrap().is_none());
        assert_eq!(store.count(b, "subjects", &Filter::new()).await.unwrap(), 0);
        assert!(!store.delete(b, "subjects", id).await.unwrap());
        assert!(store.get(a, "subjects", id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn insert_rejects_taken_id() {
        let store = InMemoryDocumentStore::new();
        let tenant = TenantId::new();
        let id = EntityId::new();

        store.insert(tenant, "roles", id, json!({})).await.unwrap();
        let err = store.insert(tenant, "roles", id, json!({})).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn upsert_unique_ignores_the_record_itself() {
        let store = InMemoryDocumentStore::new();
        let tenant = TenantId::new();
        let (first, second) = (EntityId::new(), EntityId::new());
        let unique = Filter::new().eq("roll_number", "7").eq("active", true);

        store
            .upsert_unique(tenant, "students", first, json!({ "roll_number": "7", "active": true }), &unique)
            .await
            .unwrap();
        // Re-saving the same record is fine.
        store
            .upsert_unique(tenant, "students", first, json!({ "roll_number": "7", "active": true }), &unique)
            .await
            .unwrap();

        let err = store
            .upsert_unique(tenant, "students", second, json!({ "roll_number": "7", "active": true }), &unique)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn update_many_counts_only_changed_documents() {
        let store = InMemoryDocumentStore::new();
        let tenant = TenantId::new();
        store.insert(tenant, "subjects", EntityId::new(), json!({ "teacher_id": "t", "active": true })).await.unwrap();
        store.insert(tenant, "subjects", EntityId::new(), json!({ "teacher_id": "t", "active": false })).await.unwrap();

        let filter = Filter::new().eq("teacher_id", "t").eq("active", true);
        let update = Update::new().set("teacher_id", Value::Null);

        assert_eq!(store.update_many(tenant, "subjects", &filter, &update).await.unwrap(), 1);
        assert_eq!(store.update_many(tenant, "subjects", &filter, &update).await.unwrap(), 0);
    }
}
