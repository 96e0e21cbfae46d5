//! Capability matrix: (role, module) → permission set, with custom-role override.
//!
//! Resolution order for one module:
//! 1. the principal's `allowed_modules` restriction (if any) denies outright,
//! 2. an entry in the tenant's custom role wins as-is (no merging),
//! 3. the static default matrix for the system role,
//! 4. otherwise deny.

use serde::Serialize;

use campus_core::TenantId;

use crate::{Capability, CustomRole, Module, PermissionSet, Principal, SystemRole};

/// Default grants for a built-in role. Total: anything not listed is denied.
pub fn default_permissions(role: SystemRole, module: Module) -> PermissionSet {
    use Module::*;

    match role {
        SystemRole::Admin => PermissionSet::ALLOW_ALL,
        SystemRole::Teacher => match module {
            Students | Attendance | Exams | Fees | Messaging => PermissionSet::CONTRIBUTE,
            Teachers | Departments | Subjects | Workload | Classes | Timetable | Transport
            | Reports => PermissionSet::VIEW_ONLY,
            Payments | Roles | AuditLogs | Settings => PermissionSet::DENY_ALL,
        },
        SystemRole::Student => match module {
            Subjects | Attendance | Exams | Fees | Timetable | Transport | Messaging => {
                PermissionSet::VIEW_ONLY
            }
            _ => PermissionSet::DENY_ALL,
        },
        SystemRole::Parent => match module {
            Subjects | Attendance | Exams | Fees | Timetable | Transport | Messaging
            | Payments => PermissionSet::VIEW_ONLY,
            _ => PermissionSet::DENY_ALL,
        },
    }
}

/// Resolve the four booleans for `module`.
///
/// `custom_role` is ignored unless it belongs to `tenant_id` and is active.
pub fn resolve_permissions(
    tenant_id: TenantId,
    role: SystemRole,
    custom_role: Option<&CustomRole>,
    module: Module,
) -> PermissionSet {
    resolve_with_source(tenant_id, role, custom_role, module).0
}

fn resolve_with_source(
    tenant_id: TenantId,
    role: SystemRole,
    custom_role: Option<&CustomRole>,
    module: Module,
) -> (PermissionSet, DecisionSource) {
    let custom = custom_role
        .filter(|r| r.active && r.tenant_id == tenant_id)
        .and_then(|r| r.grants_for(module));

    match custom {
        Some(grants) => (grants, DecisionSource::CustomRole),
        None => (default_permissions(role, module), DecisionSource::DefaultMatrix),
    }
}

/// Resolve permissions for a principal, honouring its module restriction.
pub fn principal_permissions(
    principal: &Principal,
    custom_role: Option<&CustomRole>,
    module: Module,
) -> PermissionSet {
    if !principal.module_allowed(module) {
        return PermissionSet::DENY_ALL;
    }
    resolve_permissions(principal.tenant_id, principal.role, custom_role, module)
}

/// Where an authorization decision came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    CustomRole,
    DefaultMatrix,
    ModuleRestricted,
    UnknownCapability,
}

/// Explanation of a single capability check, for logs and debugging endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub capability: String,
    pub granted: bool,
    pub source: DecisionSource,
    pub permissions: PermissionSet,
}

/// Explain why `capability` would be granted or denied for `principal`.
pub fn explain(principal: &Principal, custom_role: Option<&CustomRole>, capability: &str) -> Decision {
    let parsed: Capability = match capability.parse() {
        Ok(c) => c,
        Err(_) => {
            return Decision {
                capability: capability.to_string(),
                granted: false,
                source: DecisionSource::UnknownCapability,
                permissions: PermissionSet::DENY_ALL,
            };
        }
    };

    if !principal.module_allowed(parsed.module) {
        return Decision {
            capability: parsed.to_string(),
            granted: false,
            source: DecisionSource::ModuleRestricted,
            permissions: PermissionSet::DENY_ALL,
        };
    }

    let (permissions, source) =
        resolve_with_source(principal.tenant_id, principal.role, custom_role, parsed.module);

    Decision {
        capability: parsed.to_string(),
        granted: permissions.allows(parsed.action),
        source,
        permissions,
    }
}
