use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use campus_core::{DomainError, DomainResult, Entity, EntityId, TenantId};

/// A fee line charged to a class (or the whole school when `class_id` is empty).
///
/// Amounts are kept in minor units (e.g. pesewas, cents).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeStructure {
    pub id: EntityId,
    pub tenant_id: TenantId,
    pub name: String,
    #[serde(default)]
    pub class_id: Option<EntityId>,
    pub amount_minor: i64,
    pub currency: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl FeeStructure {
    pub const AUDITED_FIELDS: &'static [&'static str] = &["name", "class_id", "amount_minor", "currency"];

    pub fn new(
        tenant_id: TenantId,
        name: impl Into<String>,
        amount_minor: i64,
        currency: impl Into<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.into();
        let currency = currency.into().trim().to_uppercase();
        if name.trim().is_empty() {
            return Err(DomainError::validation("fee name must not be empty"));
        }
        if amount_minor <= 0 {
            return Err(DomainError::validation("fee amount must be positive"));
        }
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(DomainError::validation("currency must be a 3-letter ISO code"));
        }
        Ok(Self {
            id: EntityId::new(),
            tenant_id,
            name,
            class_id: None,
            amount_minor,
            currency,
            active: true,
            created_at: now,
        })
    }
}

impl Entity for FeeStructure {
    const COLLECTION: &'static str = "fee_structures";

    fn id(&self) -> EntityId {
        self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}
