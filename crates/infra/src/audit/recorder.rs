use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, warn};

use campus_core::{EntityId, TenantId};

use super::{AuditEntry, AuditParams, AuditQuery, AuditSettings, AuditStore};
use crate::external::{ExternalCallError, call_with_timeout};
use crate::store::StoreError;
use crate::tasks::BackgroundTasks;

/// Best-effort writer of audit entries.
///
/// Neither [`AuditRecorder::audit`] nor [`AuditRecorder::record`] can fail:
/// write errors and timeouts are logged and dropped.
#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<dyn AuditStore>,
    tasks: BackgroundTasks,
    settings: AuditSettings,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn AuditStore>, tasks: BackgroundTasks, settings: AuditSettings) -> Self {
        Self { store, tasks, settings }
    }

    pub fn store(&self) -> Arc<dyn AuditStore> {
        Arc::clone(&self.store)
    }

    pub fn settings(&self) -> &AuditSettings {
        &self.settings
    }

    /// Stamp params into an entry expiring after the retention window.
    ///
    /// A window reaching past the representable range keeps the entry forever.
    pub fn entry(&self, params: AuditParams, now: DateTime<Utc>) -> AuditEntry {
        let expires_at = now.checked_add_signed(self.settings.retention()).unwrap_or_else(|| {
            warn!(retention_days = self.settings.retention_days, "audit retention overflows; entry never expires");
            DateTime::<Utc>::MAX_UTC
        });
        AuditEntry {
            id: EntityId::new(),
            tenant_id: params.tenant_id,
            action: params.action,
            entity_type: params.entity_type,
            entity_id: params.entity_id,
            actor_id: params.actor.id,
            actor_name: params.actor.name,
            actor_role: params.actor.role,
            changes: params.changes,
            metadata: params.metadata,
            created_at: now,
            expires_at,
        }
    }

    /// Dispatch the write in the background and return immediately.
    pub fn audit(&self, params: AuditParams) {
        let entry = self.entry(params, Utc::now());
        let store = Arc::clone(&self.store);
        let limit = self.settings.write_timeout;
        self.tasks.spawn("audit_write", async move {
            write(store, entry, limit).await;
        });
    }

    /// Write inline. Returns whether the entry was stored.
    pub async fn record(&self, params: AuditParams) -> bool {
        let entry = self.entry(params, Utc::now());
        write(Arc::clone(&self.store), entry, self.settings.write_timeout).await
    }

    /// Wait for every dispatched write to settle.
    pub async fn flush(&self) {
        self.tasks.drain().await;
    }

    pub async fn list(&self, tenant_id: TenantId, query: &AuditQuery) -> Result<Vec<AuditEntry>, StoreError> {
        self.store.list(tenant_id, query).await
    }
}

async fn write(store: Arc<dyn AuditStore>, entry: AuditEntry, limit: Duration) -> bool {
    let tenant_id = entry.tenant_id;
    let action = entry.action;
    let entity_type = entry.entity_type.clone();
    let entity_id = entry.entity_id.clone();

    let outcome = call_with_timeout(limit, async move {
        store
            .append(entry)
            .await
            .map_err(|e| ExternalCallError::Failed(e.to_string()))
    })
    .await;

    match outcome {
        Ok(()) => true,
        Err(e) => {
            error!(
                tenant_id = %tenant_id,
                action = %action,
                entity_type = %entity_type,
                entity_id = %entity_id,
                error = %e,
                "audit write failed"
            );
            false
        }
    }
}
