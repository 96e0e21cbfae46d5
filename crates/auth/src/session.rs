//! Tenant context resolution: session credential → principal → session.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};

use campus_core::{TenantId, UserId};

use crate::matrix::{self, Decision};
use crate::{AuthError, Capability, CustomRole, Module, PermissionSet, Principal, SessionClaims, SystemRole};

/// Turns a session credential into an authenticated principal.
///
/// Every failure (bad signature, malformed claims, expired window) is
/// reported as [`AuthError::Unauthenticated`].
pub trait SessionResolver: Send + Sync {
    fn resolve(&self, credential: &str, now: DateTime<Utc>) -> Result<Principal, AuthError>;
}

/// HS256-signed session tokens carrying [`SessionClaims`].
pub struct Hs256SessionResolver {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256SessionResolver {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // The time window is checked by `validate_claims` against an injected clock.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }
}

impl SessionResolver for Hs256SessionResolver {
    fn resolve(&self, credential: &str, now: DateTime<Utc>) -> Result<Principal, AuthError> {
        let data = jsonwebtoken::decode::<SessionClaims>(credential, &self.key, &self.validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "session token rejected");
                AuthError::Unauthenticated
            })?;

        crate::validate_claims(&data.claims, now).map_err(|e| {
            tracing::debug!(error = %e, "session claims rejected");
            AuthError::Unauthenticated
        })?;

        Ok(data.claims.into_principal())
    }
}

/// Per-request authorization context: the principal plus its custom role,
/// loaded once and reused for every capability check in the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    principal: Principal,
    custom_role: Option<CustomRole>,
}

impl Session {
    /// Build a session. A custom role is kept only if it is the one the
    /// principal references, belongs to the principal's tenant, and is active.
    pub fn new(principal: Principal, custom_role: Option<CustomRole>) -> Self {
        let custom_role = custom_role.filter(|r| {
            Some(r.id) == principal.custom_role_id && r.tenant_id == principal.tenant_id && r.active
        });
        Self {
            principal,
            custom_role,
        }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn tenant_id(&self) -> TenantId {
        self.principal.tenant_id
    }

    pub fn user_id(&self) -> UserId {
        self.principal.user_id
    }

    pub fn role(&self) -> SystemRole {
        self.principal.role
    }

    pub fn custom_role(&self) -> Option<&CustomRole> {
        self.custom_role.as_ref()
    }

    pub fn permissions(&self, module: Module) -> PermissionSet {
        matrix::principal_permissions(&self.principal, self.custom_role.as_ref(), module)
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.permissions(capability.module).allows(capability.action)
    }

    pub fn explain(&self, capability: &str) -> Decision {
        matrix::explain(&self.principal, self.custom_role.as_ref(), capability)
    }

    /// Resolved permissions for every module (navigation, `whoami`).
    pub fn effective_permissions(&self) -> Vec<(Module, PermissionSet)> {
        Module::ALL
            .iter()
            .map(|m| (*m, self.permissions(*m)))
            .collect()
    }
}
