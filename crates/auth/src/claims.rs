use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use campus_core::{EntityId, TenantId, UserId};

use crate::{Module, Principal, SystemRole};

/// Session token claims (transport-agnostic).
///
/// This is the set of claims the platform expects once a session token has
/// been decoded and its signature verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject / user identifier.
    pub sub: UserId,

    /// School the session is bound to.
    pub tenant_id: TenantId,

    /// Display name, recorded as the actor name in audit entries.
    pub name: String,

    pub role: SystemRole,

    #[serde(default)]
    pub custom_role_id: Option<EntityId>,

    #[serde(default)]
    pub allowed_modules: Option<Vec<Module>>,

    pub issued_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,
}

impl SessionClaims {
    pub fn into_principal(self) -> Principal {
        Principal {
            user_id: self.sub,
            tenant_id: self.tenant_id,
            name: self.name,
            role: self.role,
            custom_role_id: self.custom_role_id,
            allowed_modules: self.allowed_modules,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate session claims.
///
/// Note: this validates the *claims* only. Signature verification happens in
/// the session resolver.
pub fn validate_claims(claims: &SessionClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}
