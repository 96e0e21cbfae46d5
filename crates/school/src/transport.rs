use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use campus_core::{DomainError, DomainResult, Entity, EntityId, TenantId};

use crate::lifecycle::impl_lifecycle;

/// School bus / van with its roster of assigned students.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportVehicle {
    pub id: EntityId,
    pub tenant_id: TenantId,
    pub registration_number: String,
    #[serde(default)]
    pub route_name: Option<String>,
    pub capacity: u32,
    #[serde(default)]
    pub assigned_students: Vec<EntityId>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransportVehicle {
    pub fn new(
        tenant_id: TenantId,
        registration_number: impl Into<String>,
        capacity: u32,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let registration_number = registration_number.into();
        if registration_number.trim().is_empty() {
            return Err(DomainError::validation("registration number must not be empty"));
        }
        if capacity == 0 {
            return Err(DomainError::validation("vehicle capacity must be positive"));
        }
        Ok(Self {
            id: EntityId::new(),
            tenant_id,
            registration_number,
            route_name: None,
            capacity,
            assigned_students: Vec::new(),
            active: true,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn assign(&mut self, student_id: EntityId, at: DateTime<Utc>) -> DomainResult<()> {
        if self.assigned_students.contains(&student_id) {
            return Err(DomainError::conflict("student is already assigned to this vehicle"));
        }
        if self.assigned_students.len() as u32 >= self.capacity {
            return Err(DomainError::conflict(format!(
                "vehicle {} is at capacity ({})",
                self.registration_number, self.capacity
            )));
        }
        self.assigned_students.push(student_id);
        self.updated_at = at;
        Ok(())
    }
}

impl Entity for TransportVehicle {
    const COLLECTION: &'static str = "transport_vehicles";

    fn id(&self) -> EntityId {
        self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

impl_lifecycle!(TransportVehicle);
