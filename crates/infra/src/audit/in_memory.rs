use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use campus_core::TenantId;

use super::{AuditEntry, AuditQuery, AuditStore};
use crate::store::StoreError;

/// In-memory audit trail for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    entries: RwLock<Vec<AuditEntry>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("audit store lock poisoned".to_string())
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, entry: AuditEntry) -> Result<(), StoreError> {
        self.entries.write().map_err(|_| poisoned())?.push(entry);
        Ok(())
    }

    async fn list(&self, tenant_id: TenantId, query: &AuditQuery) -> Result<Vec<AuditEntry>, StoreError> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        let mut matching: Vec<AuditEntry> = entries
            .iter()
            .filter(|e| e.tenant_id == tenant_id && query.matches(e))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        matching.truncate(query.limit);
        Ok(matching)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        let before = entries.len();
        entries.retain(|e| e.expires_at > now);
        Ok((before - entries.len()) as u64)
    }
}
