//! Application services: the business mutations that run after a request
//! has passed the authorization guard.
//!
//! Services take the caller's [`campus_auth::Session`] for two things only:
//! the tenant every read and write is scoped to, and the actor recorded in
//! the audit trail. Capability checks happen before a service is called.

pub mod lifecycle;
pub mod records;
pub mod roles;

use serde::{Deserialize, Deserializer};

pub use lifecycle::LifecycleService;
pub use records::{
    NewDepartment, NewFeeStructure, NewStudent, NewSubject, NewTeacher, NewVehicle, NewWorkload, RecordService,
    SubjectUpdate,
};
pub use roles::{NewRole, RoleService, RoleUpdate};

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::Arc;

    use campus_auth::{Principal, Session, SystemRole};
    use campus_core::{TenantId, UserId};

    use crate::audit::{AuditRecorder, AuditSettings, AuditStore, InMemoryAuditStore};
    use crate::store::{DocumentStore, InMemoryDocumentStore};
    use crate::tasks::BackgroundTasks;

    pub struct World {
        pub store: Arc<dyn DocumentStore>,
        pub audit_store: Arc<InMemoryAuditStore>,
        pub recorder: AuditRecorder,
        pub tenant: TenantId,
    }

    impl World {
        pub fn new() -> Self {
            let audit_store = Arc::new(InMemoryAuditStore::new());
            Self::with_audit_store(audit_store.clone(), audit_store)
        }

        pub fn with_audit_store(audit: Arc<dyn AuditStore>, audit_store: Arc<InMemoryAuditStore>) -> Self {
            Self {
                store: Arc::new(InMemoryDocumentStore::new()),
                audit_store,
                recorder: AuditRecorder::new(audit, BackgroundTasks::new(), AuditSettings::default()),
                tenant: TenantId::new(),
            }
        }

        pub fn session(&self, role: SystemRole) -> Session {
            let principal = Principal::new(self.tenant, UserId::new(), format!("{role} user"), role);
            Session::new(principal, None)
        }

        pub fn foreign_session(&self) -> Session {
            let principal = Principal::new(TenantId::new(), UserId::new(), "outsider", SystemRole::Admin);
            Session::new(principal, None)
        }
    }
}
