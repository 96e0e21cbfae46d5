use std::sync::Arc;

use tracing::info;

use campus_infra::{
    AuditRecorder, AuditSettings, AuditStore, BackgroundTasks, ConnectionManager, DocumentStore, InMemoryAuditStore,
    InMemoryDocumentStore, LifecycleService, Notifier, PostgresAuditStore, PostgresDocumentStore, RecordService,
    RetentionSweeper, RoleService, TracingNotifier,
};

use crate::config::AppConfig;

/// Service bundle shared by every handler.
#[derive(Clone)]
pub struct AppServices {
    pub records: RecordService,
    pub lifecycle: LifecycleService,
    pub roles: RoleService,
    pub audit: AuditRecorder,
    /// Present when running on Postgres.
    pub db: Option<Arc<ConnectionManager>>,
}

impl AppServices {
    fn wire(
        store: Arc<dyn DocumentStore>,
        audit_store: Arc<dyn AuditStore>,
        settings: AuditSettings,
        notifier: Arc<dyn Notifier>,
        db: Option<Arc<ConnectionManager>>,
    ) -> Self {
        let tasks = BackgroundTasks::new();
        let audit = AuditRecorder::new(audit_store, tasks.clone(), settings);
        Self {
            records: RecordService::new(Arc::clone(&store), audit.clone()),
            lifecycle: LifecycleService::new(Arc::clone(&store), audit.clone(), notifier, tasks),
            roles: RoleService::new(store, audit.clone()),
            audit,
            db,
        }
    }

    /// Everything in process memory (dev, tests).
    pub fn in_memory(settings: AuditSettings) -> Self {
        Self::wire(
            Arc::new(InMemoryDocumentStore::new()),
            Arc::new(InMemoryAuditStore::new()),
            settings,
            Arc::new(TracingNotifier),
            None,
        )
    }

    /// Postgres-backed stores sharing one lazily-connected pool.
    pub fn postgres(db: Arc<ConnectionManager>, settings: AuditSettings) -> Self {
        Self::wire(
            Arc::new(PostgresDocumentStore::new(Arc::clone(&db))),
            Arc::new(PostgresAuditStore::new(Arc::clone(&db))),
            settings,
            Arc::new(TracingNotifier),
            Some(db),
        )
    }

    pub fn from_config(config: &AppConfig) -> Self {
        match &config.database_url {
            Some(url) => {
                info!("using postgres stores");
                Self::postgres(Arc::new(ConnectionManager::new(url.clone())), config.audit.clone())
            }
            None => {
                info!("DATABASE_URL not set; using in-memory stores");
                Self::in_memory(config.audit.clone())
            }
        }
    }

    pub fn retention_sweeper(&self) -> RetentionSweeper {
        RetentionSweeper::new(self.audit.store(), self.audit.settings().purge_interval)
    }
}
