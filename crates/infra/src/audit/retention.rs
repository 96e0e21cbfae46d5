use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::AuditStore;

/// Periodically purges audit entries past their expiry.
#[derive(Clone)]
pub struct RetentionSweeper {
    store: Arc<dyn AuditStore>,
    interval: Duration,
}

impl RetentionSweeper {
    pub fn new(store: Arc<dyn AuditStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Run one purge; failures are logged and count as zero.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> u64 {
        match self.store.purge_expired(now).await {
            Ok(0) => 0,
            Ok(purged) => {
                info!(purged, "expired audit entries purged");
                purged
            }
            Err(e) => {
                warn!(error = %e, "audit retention sweep failed");
                0
            }
        }
    }

    /// Start the sweep loop on the current runtime.
    pub fn spawn(self) -> RetentionHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        self.sweep_once(Utc::now()).await;
                    }
                }
            }
        });

        RetentionHandle {
            shutdown: Some(shutdown_tx),
            join: Some(join),
        }
    }
}

/// Handle to a running [`RetentionSweeper`].
#[derive(Debug)]
pub struct RetentionHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl RetentionHandle {
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use campus_core::{EntityId, TenantId, UserId};

    use super::*;
    use crate::audit::{AuditAction, AuditEntry, AuditQuery, InMemoryAuditStore};

    fn entry(tenant_id: TenantId, created_at: DateTime<Utc>) -> AuditEntry {
        AuditEntry {
            id: EntityId::new(),
            tenant_id,
            action: AuditAction::Update,
            entity_type: "subject".into(),
            entity_id: "s1".into(),
            actor_id: UserId::new(),
            actor_name: "Admin".into(),
            actor_role: "admin".into(),
            changes: None,
            metadata: None,
            created_at,
            expires_at: created_at + chrono::Duration::days(365),
        }
    }

    #[tokio::test]
    async fn only_expired_entries_are_purged() {
        let store = Arc::new(InMemoryAuditStore::new());
        let tenant = TenantId::new();
        let now = Utc::now();
        store.append(entry(tenant, now - chrono::Duration::days(400))).await.unwrap();
        store.append(entry(tenant, now - chrono::Duration::days(10))).await.unwrap();

        let sweeper = RetentionSweeper::new(store.clone(), Duration::from_secs(3600));
        assert_eq!(sweeper.sweep_once(now).await, 1);
        assert_eq!(sweeper.sweep_once(now).await, 0);
        assert_eq!(store.list(tenant, &AuditQuery::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn spawned_loop_stops_on_shutdown() {
        let sweeper = RetentionSweeper::new(Arc::new(InMemoryAuditStore::new()), Duration::from_millis(10));
        let handle = sweeper.spawn();
        tokio::time::sleep(Duration::from_millis(25)).await;
        handle.shutdown().await;
    }
}
