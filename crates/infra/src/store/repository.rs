use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use campus_core::{DomainError, DomainResult, Entity, EntityId, TenantId};

use super::{DocumentStore, Filter, StoreError};

/// Typed view of one collection of a [`DocumentStore`].
pub struct Repository<T> {
    store: Arc<dyn DocumentStore>,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            _entity: PhantomData,
        }
    }
}

impl<T> Repository<T>
where
    T: Entity + Serialize + DeserializeOwned,
{
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _entity: PhantomData,
        }
    }

    pub async fn get(&self, tenant_id: TenantId, id: EntityId) -> DomainResult<Option<T>> {
        self.store
            .get(tenant_id, T::COLLECTION, id)
            .await?
            .map(decode)
            .transpose()
    }

    /// Like [`Repository::get`] but a missing record is `NotFound`.
    pub async fn require(&self, tenant_id: TenantId, id: EntityId) -> DomainResult<T> {
        self.get(tenant_id, id).await?.ok_or(DomainError::NotFound)
    }

    pub async fn find(&self, tenant_id: TenantId, filter: &Filter) -> DomainResult<Vec<T>> {
        self.store
            .find(tenant_id, T::COLLECTION, filter)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    pub async fn insert(&self, entity: &T) -> DomainResult<()> {
        let doc = encode(entity)?;
        self.store
            .insert(entity.tenant_id(), T::COLLECTION, entity.id(), doc)
            .await?;
        Ok(())
    }

    /// Insert or replace, rejecting the write if another record matches `unique`.
    pub async fn upsert_unique(&self, entity: &T, unique: &Filter) -> DomainResult<()> {
        let doc = encode(entity)?;
        self.store
            .upsert_unique(entity.tenant_id(), T::COLLECTION, entity.id(), doc, unique)
            .await?;
        Ok(())
    }

    pub async fn save(&self, entity: &T) -> DomainResult<()> {
        let doc = encode(entity)?;
        if self
            .store
            .replace(entity.tenant_id(), T::COLLECTION, entity.id(), doc)
            .await?
        {
            Ok(())
        } else {
            Err(DomainError::NotFound)
        }
    }

    pub async fn delete(&self, tenant_id: TenantId, id: EntityId) -> DomainResult<()> {
        if self.store.delete(tenant_id, T::COLLECTION, id).await? {
            Ok(())
        } else {
            Err(DomainError::NotFound)
        }
    }
}

fn encode<T: Serialize>(entity: &T) -> DomainResult<serde_json::Value> {
    serde_json::to_value(entity).map_err(|e| StoreError::from(e).into())
}

fn decode<T: DeserializeOwned>(doc: serde_json::Value) -> DomainResult<T> {
    serde_json::from_value(doc).map_err(|e| StoreError::from(e).into())
}
