use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use campus_core::{DomainError, DomainResult, Entity, EntityId, TenantId};

use crate::lifecycle::impl_lifecycle;

/// Academic department. Departments are hard-deleted, never deactivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: EntityId,
    pub tenant_id: TenantId,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Department {
    pub fn new(tenant_id: TenantId, name: impl Into<String>, now: DateTime<Utc>) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("department name must not be empty"));
        }
        Ok(Self {
            id: EntityId::new(),
            tenant_id,
            name,
            code: None,
            created_at: now,
            updated_at: now,
        })
    }
}

impl Entity for Department {
    const COLLECTION: &'static str = "departments";

    fn id(&self) -> EntityId {
        self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Subject taught in the school.
///
/// Teacher and department names are denormalized next to their ids; clearing a
/// reference clears the name too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: EntityId,
    pub tenant_id: TenantId,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub teacher_id: Option<EntityId>,
    #[serde(default)]
    pub teacher_name: String,
    #[serde(default)]
    pub department_id: Option<EntityId>,
    #[serde(default)]
    pub department_name: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subject {
    /// Fields diffed into the audit trail on update.
    pub const AUDITED_FIELDS: &'static [&'static str] =
        &["name", "code", "teacher_id", "teacher_name", "department_id", "department_name"];

    pub fn new(tenant_id: TenantId, name: impl Into<String>, now: DateTime<Utc>) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("subject name must not be empty"));
        }
        Ok(Self {
            id: EntityId::new(),
            tenant_id,
            name,
            code: None,
            teacher_id: None,
            teacher_name: String::new(),
            department_id: None,
            department_name: String::new(),
            active: true,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn taught_by(mut self, teacher_id: EntityId, teacher_name: impl Into<String>) -> Self {
        self.teacher_id = Some(teacher_id);
        self.teacher_name = teacher_name.into();
        self
    }

    pub fn in_department(mut self, department_id: EntityId, department_name: impl Into<String>) -> Self {
        self.department_id = Some(department_id);
        self.department_name = department_name.into();
        self
    }

    pub fn apply(&mut self, patch: SubjectPatch, at: DateTime<Utc>) -> DomainResult<()> {
        if let Some(name) = patch.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("subject name must not be empty"));
            }
            self.name = name;
        }
        if let Some(code) = patch.code {
            self.code = Some(code);
        }
        if let Some(teacher) = patch.teacher {
            match teacher {
                Some((id, name)) => {
                    self.teacher_id = Some(id);
                    self.teacher_name = name;
                }
                None => {
                    self.teacher_id = None;
                    self.teacher_name.clear();
                }
            }
        }
        if let Some(department) = patch.department {
            match department {
                Some((id, name)) => {
                    self.department_id = Some(id);
                    self.department_name = name;
                }
                None => {
                    self.department_id = None;
                    self.department_name.clear();
                }
            }
        }
        self.updated_at = at;
        Ok(())
    }
}

impl Entity for Subject {
    const COLLECTION: &'static str = "subjects";

    fn id(&self) -> EntityId {
        self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

impl_lifecycle!(Subject);

/// Partial update for a subject. `Some(None)` on a reference unassigns it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectPatch {
    pub name: Option<String>,
    pub code: Option<String>,
    pub teacher: Option<Option<(EntityId, String)>>,
    pub department: Option<Option<(EntityId, String)>>,
}

/// Weekly teaching load of one teacher for one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacultyWorkload {
    pub id: EntityId,
    pub tenant_id: TenantId,
    pub teacher_id: EntityId,
    pub subject_id: EntityId,
    #[serde(default)]
    pub department_id: Option<EntityId>,
    pub periods_per_week: u32,
    pub academic_year: String,
    pub created_at: DateTime<Utc>,
}

impl FacultyWorkload {
    pub fn new(
        tenant_id: TenantId,
        teacher_id: EntityId,
        subject_id: EntityId,
        periods_per_week: u32,
        academic_year: impl Into<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if periods_per_week == 0 {
            return Err(DomainError::validation("periods per week must be positive"));
        }
        Ok(Self {
            id: EntityId::new(),
            tenant_id,
            teacher_id,
            subject_id,
            department_id: None,
            periods_per_week,
            academic_year: academic_year.into(),
            created_at: now,
        })
    }
}

impl Entity for FacultyWorkload {
    const COLLECTION: &'static str = "workloads";

    fn id(&self) -> EntityId {
        self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}
