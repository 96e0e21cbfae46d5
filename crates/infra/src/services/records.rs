use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use campus_auth::Session;
use campus_core::{DomainError, DomainResult, Entity, EntityId};
use campus_school::{
    Department, FacultyWorkload, FeeStructure, Lifecycle, Student, Subject, SubjectPatch, Teacher, TransportVehicle,
};

use super::double_option;
use super::lifecycle::roll_number_filter;
use crate::audit::{AuditAction, AuditParams, AuditRecorder, build_changes};
use crate::store::{DocumentStore, Filter, Repository};

#[derive(Debug, Clone, Deserialize)]
pub struct NewTeacher {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub department_id: Option<EntityId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewStudent {
    pub name: String,
    pub class_id: EntityId,
    pub roll_number: String,
    #[serde(default)]
    pub guardian_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDepartment {
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSubject {
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub teacher_id: Option<EntityId>,
    #[serde(default)]
    pub department_id: Option<EntityId>,
}

/// `teacher_id: null` unassigns; an absent field leaves the teacher alone.
/// `department_id` follows the same rule.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubjectUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub teacher_id: Option<Option<EntityId>>,
    #[serde(default, deserialize_with = "double_option")]
    pub department_id: Option<Option<EntityId>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewWorkload {
    pub teacher_id: EntityId,
    pub subject_id: EntityId,
    pub periods_per_week: u32,
    pub academic_year: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewVehicle {
    pub registration_number: String,
    #[serde(default)]
    pub route_name: Option<String>,
    pub capacity: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewFeeStructure {
    pub name: String,
    #[serde(default)]
    pub class_id: Option<EntityId>,
    pub amount_minor: i64,
    pub currency: String,
}

/// Creation and editing of school records, each write audited.
#[derive(Clone)]
pub struct RecordService {
    store: Arc<dyn DocumentStore>,
    audit: AuditRecorder,
}

impl RecordService {
    pub fn new(store: Arc<dyn DocumentStore>, audit: AuditRecorder) -> Self {
        Self { store, audit }
    }

    fn repo<T: Entity + Serialize + DeserializeOwned>(&self) -> Repository<T> {
        Repository::new(Arc::clone(&self.store))
    }

    pub async fn list<T: Entity + Serialize + DeserializeOwned>(&self, session: &Session) -> DomainResult<Vec<T>> {
        self.repo::<T>().find(session.tenant_id(), &Filter::new()).await
    }

    pub async fn get<T: Entity + Serialize + DeserializeOwned>(&self, session: &Session, id: EntityId) -> DomainResult<T> {
        self.repo::<T>().require(session.tenant_id(), id).await
    }

    pub async fn create_teacher(&self, session: &Session, input: NewTeacher) -> DomainResult<Teacher> {
        let mut teacher = Teacher::new(session.tenant_id(), input.name, Utc::now())?;
        teacher.email = input.email;
        if let Some(department_id) = input.department_id {
            self.repo::<Department>().require(session.tenant_id(), department_id).await?;
            teacher = teacher.in_department(department_id);
        }
        self.repo::<Teacher>().insert(&teacher).await?;
        self.audit_created(session, "teacher", teacher.id, &teacher, &["name", "email", "department_id"]);
        Ok(teacher)
    }

    /// Enrol a student; at most one active student per class and roll number.
    pub async fn enroll_student(&self, session: &Session, input: NewStudent) -> DomainResult<Student> {
        let mut student = Student::new(
            session.tenant_id(),
            input.name,
            input.class_id,
            input.roll_number,
            Utc::now(),
        )?;
        student.guardian_name = input.guardian_name;

        self.repo::<Student>()
            .upsert_unique(&student, &roll_number_filter(&student))
            .await
            .map_err(|e| match e {
                DomainError::Conflict(_) => DomainError::conflict(student.duplicate_roll_message()),
                other => other,
            })?;
        self.audit_created(session, "student", student.id, &student, &["name", "class_id", "roll_number"]);
        Ok(student)
    }

    pub async fn create_department(&self, session: &Session, input: NewDepartment) -> DomainResult<Department> {
        let mut department = Department::new(session.tenant_id(), input.name, Utc::now())?;
        department.code = input.code;
        self.repo::<Department>().insert(&department).await?;
        self.audit_created(session, "department", department.id, &department, &["name", "code"]);
        Ok(department)
    }

    pub async fn create_subject(&self, session: &Session, input: NewSubject) -> DomainResult<Subject> {
        let tenant_id = session.tenant_id();
        let mut subject = Subject::new(tenant_id, input.name, Utc::now())?;
        subject.code = input.code;
        if let Some(teacher_id) = input.teacher_id {
            let teacher = self.active_teacher(session, teacher_id).await?;
            subject = subject.taught_by(teacher.id, teacher.name);
        }
        if let Some(department_id) = input.department_id {
            let department = self.repo::<Department>().require(tenant_id, department_id).await?;
            subject = subject.in_department(department.id, department.name);
        }

        self.repo::<Subject>().insert(&subject).await?;
        self.audit_created(session, "subject", subject.id, &subject, Subject::AUDITED_FIELDS);
        Ok(subject)
    }

    /// Apply a partial update. An update that changes nothing writes no audit entry.
    pub async fn update_subject(&self, session: &Session, id: EntityId, input: SubjectUpdate) -> DomainResult<Subject> {
        let repo = self.repo::<Subject>();
        let before = repo.require(session.tenant_id(), id).await?;

        let teacher = match input.teacher_id {
            None => None,
            Some(None) => Some(None),
            Some(Some(teacher_id)) => {
                let teacher = self.active_teacher(session, teacher_id).await?;
                Some(Some((teacher.id, teacher.name)))
            }
        };
        let department = match input.department_id {
            None => None,
            Some(None) => Some(None),
            Some(Some(department_id)) => {
                let department = self.repo::<Department>().require(session.tenant_id(), department_id).await?;
                Some(Some((department.id, department.name)))
            }
        };

        let mut subject = before.clone();
        subject.apply(
            SubjectPatch {
                name: input.name,
                code: input.code,
                teacher,
                department,
            },
            Utc::now(),
        )?;
        repo.save(&subject).await?;

        if let Some(changes) = build_changes(&before, &subject, Subject::AUDITED_FIELDS) {
            self.audit.audit(
                AuditParams::by(session, AuditAction::Update, "subject", id).with_changes(Some(changes)),
            );
        }
        Ok(subject)
    }

    pub async fn create_workload(&self, session: &Session, input: NewWorkload) -> DomainResult<FacultyWorkload> {
        let tenant_id = session.tenant_id();
        let teacher = self.active_teacher(session, input.teacher_id).await?;
        let subject = self.repo::<Subject>().require(tenant_id, input.subject_id).await?;

        let mut workload = FacultyWorkload::new(
            tenant_id,
            teacher.id,
            subject.id,
            input.periods_per_week,
            input.academic_year,
            Utc::now(),
        )?;
        workload.department_id = subject.department_id;

        self.repo::<FacultyWorkload>().insert(&workload).await?;
        self.audit_created(
            session,
            "faculty_workload",
            workload.id,
            &workload,
            &["teacher_id", "subject_id", "periods_per_week", "academic_year"],
        );
        Ok(workload)
    }

    pub async fn create_vehicle(&self, session: &Session, input: NewVehicle) -> DomainResult<TransportVehicle> {
        let mut vehicle = TransportVehicle::new(session.tenant_id(), input.registration_number, input.capacity, Utc::now())?;
        vehicle.route_name = input.route_name;
        self.repo::<TransportVehicle>().insert(&vehicle).await?;
        self.audit_created(
            session,
            "transport_vehicle",
            vehicle.id,
            &vehicle,
            &["registration_number", "route_name", "capacity"],
        );
        Ok(vehicle)
    }

    /// Put an active student on a vehicle's roster.
    pub async fn assign_student(&self, session: &Session, vehicle_id: EntityId, student_id: EntityId) -> DomainResult<TransportVehicle> {
        let tenant_id = session.tenant_id();
        let student = self.repo::<Student>().require(tenant_id, student_id).await?;
        if !student.is_active() {
            return Err(DomainError::conflict("inactive students cannot be assigned transport"));
        }

        let repo = self.repo::<TransportVehicle>();
        let before = repo.require(tenant_id, vehicle_id).await?;
        if !before.is_active() {
            return Err(DomainError::conflict(format!(
                "vehicle {} is inactive",
                before.registration_number
            )));
        }
        let mut vehicle = before.clone();
        vehicle.assign(student.id, Utc::now())?;
        repo.save(&vehicle).await?;

        self.audit.audit(
            AuditParams::by(session, AuditAction::Update, "transport_vehicle", vehicle_id)
                .with_changes(build_changes(&before, &vehicle, &["assigned_students"])),
        );
        Ok(vehicle)
    }

    pub async fn create_fee_structure(&self, session: &Session, input: NewFeeStructure) -> DomainResult<FeeStructure> {
        let mut fee = FeeStructure::new(session.tenant_id(), input.name, input.amount_minor, input.currency, Utc::now())?;
        fee.class_id = input.class_id;
        self.repo::<FeeStructure>().insert(&fee).await?;
        self.audit_created(session, "fee_structure", fee.id, &fee, FeeStructure::AUDITED_FIELDS);
        info!(tenant_id = %fee.tenant_id, fee_id = %fee.id, amount_minor = fee.amount_minor, "fee structure created");
        Ok(fee)
    }

    async fn active_teacher(&self, session: &Session, teacher_id: EntityId) -> DomainResult<Teacher> {
        let teacher = self.repo::<Teacher>().require(session.tenant_id(), teacher_id).await?;
        if !teacher.is_active() {
            return Err(DomainError::conflict(format!("teacher {} is inactive", teacher.name)));
        }
        Ok(teacher)
    }

    fn audit_created<T: Serialize>(&self, session: &Session, entity_type: &str, id: EntityId, record: &T, fields: &[&str]) {
        self.audit.audit(
            AuditParams::by(session, AuditAction::Create, entity_type, id)
                .with_changes(build_changes(&Value::Null, record, fields)),
        );
    }
}

#[cfg(test)]
mod tests {
    use campus_auth::SystemRole;

    use super::*;
    use crate::audit::AuditQuery;
    use crate::audit::AuditStore;
    use crate::services::fixtures::World;

    fn student(roll: &str, class_id: EntityId) -> NewStudent {
        NewStudent {
            name: format!("Student {roll}"),
            class_id,
            roll_number: roll.to_string(),
            guardian_name: None,
        }
    }

    #[tokio::test]
    async fn duplicate_active_roll_number_is_a_conflict() {
        let world = World::new();
        let admin = world.session(SystemRole::Admin);
        let records = RecordService::new(world.store.clone(), world.recorder.clone());
        let class = EntityId::new();

        records.enroll_student(&admin, student("12", class)).await.unwrap();
        let err = records.enroll_student(&admin, student(" 12 ", class)).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(ref m) if m.contains("'12'")), "{err:?}");

        // Same roll number in another class is fine.
        records.enroll_student(&admin, student("12", EntityId::new())).await.unwrap();
    }

    #[tokio::test]
    async fn subject_update_records_only_changed_fields() {
        let world = World::new();
        let admin = world.session(SystemRole::Admin);
        let records = RecordService::new(world.store.clone(), world.recorder.clone());

        let teacher = records
            .create_teacher(&admin, NewTeacher { name: "Ada".into(), email: None, department_id: None })
            .await
            .unwrap();
        let subject = records
            .create_subject(&admin, NewSubject { name: "Physics".into(), code: None, teacher_id: None, department_id: None })
            .await
            .unwrap();

        let update = SubjectUpdate { teacher_id: Some(Some(teacher.id)), ..Default::default() };
        let updated = records.update_subject(&admin, subject.id, update).await.unwrap();
        assert_eq!(updated.teacher_name, "Ada");

        // No-op update writes nothing.
        records.update_subject(&admin, subject.id, SubjectUpdate::default()).await.unwrap();
        world.recorder.flush().await;

        let updates = world
            .audit_store
            .list(world.tenant, &AuditQuery { action: Some(AuditAction::Update), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(updates.len(), 1);
        let changes = updates[0].changes.as_ref().unwrap();
        assert_eq!(changes.keys().map(String::as_str).collect::<Vec<_>>(), vec!["teacher_id", "teacher_name"]);
    }

    #[tokio::test]
    async fn fee_creation_is_audited_with_its_fields() {
        let world = World::new();
        let admin = world.session(SystemRole::Admin);
        let records = RecordService::new(world.store.clone(), world.recorder.clone());

        let fee = records
            .create_fee_structure(
                &admin,
                NewFeeStructure { name: "Tuition".into(), class_id: None, amount_minor: 150_000, currency: "ghs".into() },
            )
            .await
            .unwrap();
        assert_eq!(fee.currency, "GHS");
        world.recorder.flush().await;

        let entries = world.audit_store.list(world.tenant, &AuditQuery::default()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, AuditAction::Create);
        let changes = entries[0].changes.as_ref().unwrap();
        assert_eq!(changes["amount_minor"].new, Value::from(150_000));
        assert!(!changes.contains_key("class_id"));
    }

    #[tokio::test]
    async fn subjects_cannot_reference_another_tenants_teacher() {
        let world = World::new();
        let admin = world.session(SystemRole::Admin);
        let outsider = world.foreign_session();
        let records = RecordService::new(world.store.clone(), world.recorder.clone());

        let foreign_teacher = records
            .create_teacher(&outsider, NewTeacher { name: "Eve".into(), email: None, department_id: None })
            .await
            .unwrap();
        let err = records
            .create_subject(
                &admin,
                NewSubject { name: "Spying".into(), code: None, teacher_id: Some(foreign_teacher.id), department_id: None },
            )
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[tokio::test]
    async fn full_vehicles_refuse_more_students() {
        let world = World::new();
        let admin = world.session(SystemRole::Admin);
        let records = RecordService::new(world.store.clone(), world.recorder.clone());
        let class = EntityId::new();

        let van = records
            .create_vehicle(&admin, NewVehicle { registration_number: "GT-55".into(), route_name: None, capacity: 1 })
            .await
            .unwrap();
        let a = records.enroll_student(&admin, student("1", class)).await.unwrap();
        let b = records.enroll_student(&admin, student("2", class)).await.unwrap();

        records.assign_student(&admin, van.id, a.id).await.unwrap();
        let err = records.assign_student(&admin, van.id, b.id).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn explicit_null_unassigns_teacher() {
        let update: SubjectUpdate = serde_json::from_str(r#"{ "teacher_id": null }"#).unwrap();
        assert_eq!(update.teacher_id, Some(None));
        let update: SubjectUpdate = serde_json::from_str("{}").unwrap();
        assert_eq!(update.teacher_id, None);
    }
}
