//! Tenant-isolated document storage.
//!
//! Every operation takes the tenant explicitly and only ever sees that
//! tenant's records: there is no call that reads or writes across tenants.
//! Records are JSON documents grouped into named collections.

pub mod in_memory;
pub mod postgres;
pub mod repository;
#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use campus_core::{DomainError, EntityId, TenantId};

pub use in_memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;
pub use repository::Repository;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("duplicate: {0}")]
    Duplicate(String),

    #[error("{collection} {id} already exists")]
    AlreadyExists { collection: String, id: EntityId },

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value.to_string())
    }
}

impl From<StoreError> for DomainError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Duplicate(msg) => DomainError::Conflict(msg),
            StoreError::AlreadyExists { .. } => DomainError::Conflict(value.to_string()),
            other => DomainError::Internal(other.to_string()),
        }
    }
}

/// A single match condition on a top-level document field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `field == value` (a `null` value only matches an explicit null).
    Eq(String, Value),
    /// `field` is an array containing `value`.
    Contains(String, Value),
}

impl Condition {
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Condition::Eq(field, value) => doc.get(field) == Some(value),
            Condition::Contains(field, value) => doc
                .get(field)
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(value)),
        }
    }
}

/// Conjunction of conditions. The empty filter matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Eq(field.into(), value.into()));
        self
    }

    pub fn contains(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Contains(field.into(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.conditions.iter().all(|c| c.matches(doc))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
    /// Set a top-level field.
    Set(String, Value),
    /// Remove every occurrence of a value from an array field.
    Pull(String, Value),
}

/// Bulk update applied to every document matching a filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    ops: Vec<UpdateOp>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Set(field.into(), value.into()));
        self
    }

    pub fn pull(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Pull(field.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Apply in place. Returns whether the document changed.
    pub fn apply(&self, doc: &mut Value) -> bool {
        let Some(obj) = doc.as_object_mut() else {
            return false;
        };

        let mut changed = false;
        for op in &self.ops {
            match op {
                UpdateOp::Set(field, value) => {
                    if obj.get(field) != Some(value) {
                        obj.insert(field.clone(), value.clone());
                        changed = true;
                    }
                }
                UpdateOp::Pull(field, value) => {
                    if let Some(Value::Array(items)) = obj.get_mut(field) {
                        let before = items.len();
                        items.retain(|v| v != value);
                        changed |= items.len() != before;
                    }
                }
            }
        }
        changed
    }
}

/// Tenant-scoped CRUD over JSON documents with filter-by-field and bulk updates.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, tenant_id: TenantId, collection: &str, id: EntityId) -> Result<Option<Value>, StoreError>;

    async fn find(&self, tenant_id: TenantId, collection: &str, filter: &Filter) -> Result<Vec<Value>, StoreError>;

    async fn count(&self, tenant_id: TenantId, collection: &str, filter: &Filter) -> Result<u64, StoreError>;

    /// Insert a new document; fails with `AlreadyExists` if the id is taken.
    async fn insert(&self, tenant_id: TenantId, collection: &str, id: EntityId, doc: Value) -> Result<(), StoreError>;

    /// Atomically insert or replace `id`, failing with `Duplicate` if any
    /// *other* document in the collection matches `unique`.
    async fn upsert_unique(
        &self,
        tenant_id: TenantId,
        collection: &str,
        id: EntityId,
        doc: Value,
        unique: &Filter,
    ) -> Result<(), StoreError>;

    /// Replace an existing document. Returns `false` if it does not exist.
    async fn replace(&self, tenant_id: TenantId, collection: &str, id: EntityId, doc: Value) -> Result<bool, StoreError>;

    /// Apply `update` to every matching document; returns how many changed.
    async fn update_many(
        &self,
        tenant_id: TenantId,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<u64, StoreError>;

    async fn delete(&self, tenant_id: TenantId, collection: &str, id: EntityId) -> Result<bool, StoreError>;

    async fn delete_many(&self, tenant_id: TenantId, collection: &str, filter: &Filter) -> Result<u64, StoreError>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn eq_null_matches_explicit_null_only() {
        let filter = Filter::new().eq("teacher_id", Value::Null);
        assert!(filter.matches(&json!({ "teacher_id": null })));
        assert!(!filter.matches(&json!({})));
        assert!(!filter.matches(&json!({ "teacher_id": "t1" })));
    }

    #[test]
    fn contains_requires_array_membership() {
        let filter = Filter::new().contains("assigned_students", "s1");
        assert!(filter.matches(&json!({ "assigned_students": ["s0", "s1"] })));
        assert!(!filter.matches(&json!({ "assigned_students": "s1" })));
        assert!(!filter.matches(&json!({ "assigned_students": [] })));
    }

    #[test]
    fn update_reports_change_only_when_something_moved() {
        let update = Update::new().set("teacher_id", Value::Null).pull("ids", "a");
        let mut doc = json!({ "teacher_id": "t1", "ids": ["a", "b", "a"] });

        assert!(update.apply(&mut doc));
        assert_eq!(doc, json!({ "teacher_id": null, "ids": ["b"] }));
        assert!(!update.apply(&mut doc));
    }
}
