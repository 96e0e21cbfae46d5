//! Authorization guard: the single choke point before any business operation.
//!
//! The guard decides *whether* a session may act. It does not scope data:
//! every query made afterwards must still pass `session.tenant_id()` to the
//! store.

use thiserror::Error;

use crate::{Capability, Session, SystemRole};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No valid session accompanied the request.
    #[error("authentication required")]
    Unauthenticated,

    /// Valid session, capability not granted. Only the capability name leaks.
    #[error("forbidden: missing capability '{capability}'")]
    Forbidden { capability: String },

    /// Valid session, role outside the allowed set of a role-gated operation.
    #[error("forbidden: role '{role}' is not allowed")]
    RoleNotAllowed { role: SystemRole },
}

/// Require an authenticated session holding `capability` (`"<module>:<action>"`).
///
/// Unknown or malformed capability strings deny.
pub fn require_auth<'a>(session: Option<&'a Session>, capability: &str) -> Result<&'a Session, AuthError> {
    let session = session.ok_or(AuthError::Unauthenticated)?;

    let decision = session.explain(capability);
    if decision.granted {
        tracing::debug!(
            tenant_id = %session.tenant_id(),
            user_id = %session.user_id(),
            capability = %decision.capability,
            source = ?decision.source,
            "capability granted"
        );
        return Ok(session);
    }

    if decision.source == crate::DecisionSource::UnknownCapability {
        tracing::warn!(capability, "guard asked for an unknown capability");
    } else {
        tracing::debug!(
            tenant_id = %session.tenant_id(),
            user_id = %session.user_id(),
            capability = %decision.capability,
            source = ?decision.source,
            "capability denied"
        );
    }

    Err(AuthError::Forbidden {
        capability: decision.capability,
    })
}

/// Typed variant of [`require_auth`].
pub fn require_capability(session: Option<&Session>, capability: Capability) -> Result<&Session, AuthError> {
    let session = session.ok_or(AuthError::Unauthenticated)?;
    if session.can(capability) {
        Ok(session)
    } else {
        Err(AuthError::Forbidden {
            capability: capability.to_string(),
        })
    }
}

/// Require an authenticated session whose system role is in `allowed`.
///
/// Role gating bypasses the capability matrix entirely; custom roles do not
/// widen it.
pub fn require_role<'a>(session: Option<&'a Session>, allowed: &[SystemRole]) -> Result<&'a Session, AuthError> {
    let session = session.ok_or(AuthError::Unauthenticated)?;
    if allowed.contains(&session.role()) {
        Ok(session)
    } else {
        Err(AuthError::RoleNotAllowed {
            role: session.role(),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use proptest::prelude::*;

    use campus_core::{TenantId, UserId};

    use super::*;
    use crate::{Action, CustomRole, Module, PermissionSet, Principal, default_permissions};

    fn session(role: SystemRole) -> Session {
        Session::new(Principal::new(TenantId::new(), UserId::new(), "x", role), None)
    }

    #[test]
    fn anonymous_requests_are_unauthenticated() {
        assert_eq!(require_auth(None, "fees:view"), Err(AuthError::Unauthenticated));
        assert_eq!(
            require_capability(None, Capability::new(Module::Fees, Action::View)),
            Err(AuthError::Unauthenticated)
        );
        assert_eq!(require_role(None, &[SystemRole::Admin]), Err(AuthError::Unauthenticated));
    }

    #[test]
    fn read_only_custom_role_forbids_adding_fees() {
        let tenant = TenantId::new();
        let role = CustomRole::new(tenant, "ReadOnlyTeacher", Utc::now())
            .with_grant(Module::Fees, PermissionSet::VIEW_ONLY);
        let principal = Principal::new(tenant, UserId::new(), "t", SystemRole::Teacher)
            .with_custom_role(role.id);
        let session = Session::new(principal, Some(role));

        assert!(require_auth(Some(&session), "fees:view").is_ok());
        assert_eq!(
            require_auth(Some(&session), "fees:add"),
            Err(AuthError::Forbidden {
                capability: "fees:add".to_string()
            })
        );
    }

    #[test]
    fn typo_in_capability_is_forbidden_even_for_admin() {
        let admin = session(SystemRole::Admin);
        assert!(matches!(
            require_auth(Some(&admin), "fes:add"),
            Err(AuthError::Forbidden { .. })
        ));
    }

    #[test]
    fn require_role_ignores_the_matrix() {
        let tenant = TenantId::new();
        let widened = CustomRole::new(tenant, "Everything", Utc::now())
            .with_grant(Module::Roles, PermissionSet::ALLOW_ALL);
        let principal = Principal::new(tenant, UserId::new(), "t", SystemRole::Teacher)
            .with_custom_role(widened.id);
        let teacher = Session::new(principal, Some(widened));

        assert!(require_auth(Some(&teacher), "roles:delete").is_ok());
        assert_eq!(
            require_role(Some(&teacher), &[SystemRole::Admin]),
            Err(AuthError::RoleNotAllowed {
                role: SystemRole::Teacher
            })
        );
        assert!(require_role(Some(&session(SystemRole::Admin)), &[SystemRole::Admin]).is_ok());
    }

    proptest! {
        #[test]
        fn guard_denies_everything_not_granted_by_default(
            role in prop::sample::select(SystemRole::ALL.to_vec()),
            module in prop::sample::select(Module::ALL.to_vec()),
            action in prop::sample::select(Action::ALL.to_vec()),
        ) {
            let s = session(role);
            let result = require_auth(Some(&s), &Capability::new(module, action).to_string());
            prop_assert_eq!(result.is_ok(), default_permissions(role, module).allows(action));
        }
    }
}
