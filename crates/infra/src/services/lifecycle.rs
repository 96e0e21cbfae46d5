use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};

use campus_auth::Session;
use campus_core::{DomainError, DomainResult, EntityId};
use campus_school::{Department, Lifecycle, ParentKind, Student, Subject, Teacher};

use crate::audit::{AuditAction, AuditParams, AuditRecorder, build_changes};
use crate::cascade::{CascadeCoordinator, CascadeSummary};
use crate::external::{Notifier, call_with_timeout};
use crate::store::{DocumentStore, Filter, Repository};
use crate::tasks::BackgroundTasks;

/// Deactivation, reactivation and guarded deletion of parent records.
///
/// Order within one call: load and mutate the parent, then cascade to its
/// dependents, then dispatch the audit entry. Only the parent mutation can
/// fail the call.
#[derive(Clone)]
pub struct LifecycleService {
    store: Arc<dyn DocumentStore>,
    cascade: CascadeCoordinator,
    audit: AuditRecorder,
    notifier: Arc<dyn Notifier>,
    tasks: BackgroundTasks,
    notify_timeout: Duration,
}

impl LifecycleService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        audit: AuditRecorder,
        notifier: Arc<dyn Notifier>,
        tasks: BackgroundTasks,
    ) -> Self {
        Self {
            cascade: CascadeCoordinator::new(Arc::clone(&store)),
            store,
            audit,
            notifier,
            tasks,
            notify_timeout: Duration::from_secs(5),
        }
    }

    /// Deactivate a teacher or student and cascade to its dependents.
    pub async fn deactivate(&self, session: &Session, kind: ParentKind, id: EntityId) -> DomainResult<CascadeSummary> {
        match kind {
            ParentKind::Teacher => self.deactivate_record::<Teacher>(session, kind, id).await.map(|(_, s)| s),
            ParentKind::Student => {
                let (student, summary) = self.deactivate_record::<Student>(session, kind, id).await?;
                self.notify_guardian(&student);
                Ok(summary)
            }
            ParentKind::Department => Err(DomainError::validation(
                "departments are deleted, not deactivated",
            )),
        }
    }

    /// Bring a deactivated teacher or student back. Not an undo: dependents
    /// cleared by the deactivation cascade stay cleared.
    pub async fn reactivate(&self, session: &Session, kind: ParentKind, id: EntityId) -> DomainResult<()> {
        match kind {
            ParentKind::Teacher => {
                let repo = Repository::<Teacher>::new(Arc::clone(&self.store));
                let before = repo.require(session.tenant_id(), id).await?;
                let mut teacher = before.clone();
                teacher.reactivate(Utc::now())?;
                repo.save(&teacher).await?;
                self.audit_reactivation(session, kind, id, &before, &teacher);
                Ok(())
            }
            ParentKind::Student => {
                let repo = Repository::<Student>::new(Arc::clone(&self.store));
                let before = repo.require(session.tenant_id(), id).await?;
                let mut student = before.clone();
                student.reactivate(Utc::now())?;
                // The roll number may have been reissued while this student was inactive.
                repo.upsert_unique(&student, &roll_number_filter(&student))
                    .await
                    .map_err(|e| match e {
                        DomainError::Conflict(_) => DomainError::conflict(student.duplicate_roll_message()),
                        other => other,
                    })?;
                self.audit_reactivation(session, kind, id, &before, &student);
                Ok(())
            }
            ParentKind::Department => Err(DomainError::validation("departments cannot be reactivated")),
        }
    }

    /// Hard-delete a department unless active dependents still reference it.
    pub async fn delete_department(&self, session: &Session, id: EntityId) -> DomainResult<CascadeSummary> {
        let tenant_id = session.tenant_id();
        let repo = Repository::<Department>::new(Arc::clone(&self.store));
        let department = repo.require(tenant_id, id).await?;

        if let Some(block) = self.cascade.check_delete(ParentKind::Department, id, tenant_id).await {
            info!(tenant_id = %tenant_id, department_id = %id, count = block.count, "department delete blocked");
            return Err(DomainError::cascade_blocked(block.count, block.reason));
        }

        repo.delete(tenant_id, id).await?;
        info!(tenant_id = %tenant_id, department_id = %id, name = %department.name, "department deleted");

        let summary = self
            .cascade
            .cascade_on_deactivate(ParentKind::Department, id, tenant_id, Utc::now())
            .await;

        self.audit.audit(
            AuditParams::by(session, AuditAction::Delete, ParentKind::Department.as_str(), id)
                .with_metadata(with_name(summary.to_metadata(), &department.name)),
        );
        Ok(summary)
    }

    /// Re-run every cascade rule for a parent that is already inactive or
    /// deleted, picking up rules that failed the first time. A clean parent
    /// yields zero counts.
    pub async fn recascade(&self, session: &Session, kind: ParentKind, id: EntityId) -> DomainResult<CascadeSummary> {
        let tenant_id = session.tenant_id();
        match kind {
            ParentKind::Teacher => self.require_inactive::<Teacher>(session, id).await?,
            ParentKind::Student => self.require_inactive::<Student>(session, id).await?,
            ParentKind::Department => {
                let repo = Repository::<Department>::new(Arc::clone(&self.store));
                if repo.get(tenant_id, id).await?.is_some() {
                    return Err(DomainError::conflict("department still exists; delete it instead"));
                }
            }
        }

        let summary = self.cascade.cascade_on_deactivate(kind, id, tenant_id, Utc::now()).await;
        info!(
            tenant_id = %tenant_id,
            kind = %kind,
            id = %id,
            failed = summary.failed.len(),
            "cascade re-run"
        );

        self.audit.audit(
            AuditParams::by(session, AuditAction::Update, kind.as_str(), id)
                .with_metadata(with_operation(summary.to_metadata(), "recascade")),
        );
        Ok(summary)
    }

    /// Retire a subject so it no longer holds its department or teacher.
    pub async fn deactivate_subject(&self, session: &Session, id: EntityId) -> DomainResult<Subject> {
        let repo = Repository::<Subject>::new(Arc::clone(&self.store));
        let before = repo.require(session.tenant_id(), id).await?;
        let mut subject = before.clone();
        subject.deactivate(Utc::now())?;
        repo.save(&subject).await?;
        info!(tenant_id = %session.tenant_id(), subject_id = %id, "subject deactivated");

        self.audit.audit(
            AuditParams::by(session, AuditAction::Delete, "subject", id)
                .with_changes(build_changes(&before, &subject, &["active"])),
        );
        Ok(subject)
    }

    pub async fn reactivate_subject(&self, session: &Session, id: EntityId) -> DomainResult<Subject> {
        let repo = Repository::<Subject>::new(Arc::clone(&self.store));
        let before = repo.require(session.tenant_id(), id).await?;
        let mut subject = before.clone();
        subject.reactivate(Utc::now())?;
        repo.save(&subject).await?;
        info!(tenant_id = %session.tenant_id(), subject_id = %id, "subject reactivated");

        self.audit.audit(
            AuditParams::by(session, AuditAction::Update, "subject", id)
                .with_changes(build_changes(&before, &subject, &["active"])),
        );
        Ok(subject)
    }

    async fn require_inactive<T>(&self, session: &Session, id: EntityId) -> DomainResult<()>
    where
        T: Lifecycle + Serialize + DeserializeOwned,
    {
        let record = Repository::<T>::new(Arc::clone(&self.store)).require(session.tenant_id(), id).await?;
        if record.is_active() {
            return Err(DomainError::conflict(format!(
                "{} {} is still active; deactivate it first",
                T::COLLECTION,
                id
            )));
        }
        Ok(())
    }

    async fn deactivate_record<T>(&self, session: &Session, kind: ParentKind, id: EntityId) -> DomainResult<(T, CascadeSummary)>
    where
        T: Lifecycle + Serialize + DeserializeOwned,
    {
        let tenant_id = session.tenant_id();
        let repo = Repository::<T>::new(Arc::clone(&self.store));
        let now = Utc::now();

        let mut record = repo.require(tenant_id, id).await?;
        record.deactivate(now)?;
        repo.save(&record).await?;
        info!(tenant_id = %tenant_id, kind = %kind, id = %id, "record deactivated");

        let summary = self.cascade.cascade_on_deactivate(kind, id, tenant_id, now).await;

        self.audit.audit(
            AuditParams::by(session, AuditAction::Delete, kind.as_str(), id).with_metadata(summary.to_metadata()),
        );
        Ok((record, summary))
    }

    fn audit_reactivation<T: Serialize>(&self, session: &Session, kind: ParentKind, id: EntityId, before: &T, after: &T) {
        info!(tenant_id = %session.tenant_id(), kind = %kind, id = %id, "record reactivated");
        self.audit.audit(
            AuditParams::by(session, AuditAction::Update, kind.as_str(), id)
                .with_changes(build_changes(before, after, &["active"])),
        );
    }

    fn notify_guardian(&self, student: &Student) {
        let Some(guardian) = student.guardian_name.clone() else {
            return;
        };
        let notifier = Arc::clone(&self.notifier);
        let tenant_id = student.tenant_id;
        let message = format!("{} has been withdrawn from the school roll.", student.name);
        let limit = self.notify_timeout;

        self.tasks.spawn("guardian_notification", async move {
            if let Err(e) = call_with_timeout(limit, notifier.notify(tenant_id, &guardian, &message)).await {
                warn!(tenant_id = %tenant_id, error = %e, "guardian notification failed");
            }
        });
    }
}

/// Active students sharing a class and roll number.
pub(crate) fn roll_number_filter(student: &Student) -> Filter {
    Filter::new()
        .eq("class_id", student.class_id.to_string())
        .eq("roll_number", student.roll_number.clone())
        .eq("active", true)
}

fn with_operation(mut metadata: Value, operation: &str) -> Value {
    if let Some(obj) = metadata.as_object_mut() {
        obj.insert("operation".to_string(), Value::String(operation.to_string()));
    }
    metadata
}

fn with_name(mut metadata: Value, name: &str) -> Value {
    if let Some(obj) = metadata.as_object_mut() {
        obj.insert("name".to_string(), Value::String(name.to_string()));
    }
    metadata
}
