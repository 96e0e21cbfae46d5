use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use campus_core::{DomainError, DomainResult, Entity, EntityId, TenantId};

use crate::lifecycle::impl_lifecycle;

/// Teaching staff member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teacher {
    pub id: EntityId,
    pub tenant_id: TenantId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub department_id: Option<EntityId>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Teacher {
    pub fn new(tenant_id: TenantId, name: impl Into<String>, now: DateTime<Utc>) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("teacher name must not be empty"));
        }
        Ok(Self {
            id: EntityId::new(),
            tenant_id,
            name,
            email: None,
            department_id: None,
            active: true,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn in_department(mut self, department_id: EntityId) -> Self {
        self.department_id = Some(department_id);
        self
    }
}

impl Entity for Teacher {
    const COLLECTION: &'static str = "teachers";

    fn id(&self) -> EntityId {
        self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

impl_lifecycle!(Teacher);

/// Enrolled student.
///
/// # Invariants
/// - At most one *active* student per `(class_id, roll_number)` within a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: EntityId,
    pub tenant_id: TenantId,
    pub name: String,
    pub class_id: EntityId,
    pub roll_number: String,
    #[serde(default)]
    pub guardian_name: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Student {
    pub fn new(
        tenant_id: TenantId,
        name: impl Into<String>,
        class_id: EntityId,
        roll_number: impl Into<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.into();
        let roll_number = roll_number.into().trim().to_string();
        if name.trim().is_empty() {
            return Err(DomainError::validation("student name must not be empty"));
        }
        if roll_number.is_empty() {
            return Err(DomainError::validation("roll number must not be empty"));
        }
        Ok(Self {
            id: EntityId::new(),
            tenant_id,
            name,
            class_id,
            roll_number,
            guardian_name: None,
            active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Human-readable message for a roll-number collision.
    pub fn duplicate_roll_message(&self) -> String {
        format!(
            "roll number '{}' is already taken in class {}",
            self.roll_number, self.class_id
        )
    }
}

impl Entity for Student {
    const COLLECTION: &'static str = "students";

    fn id(&self) -> EntityId {
        self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

impl_lifecycle!(Student);
