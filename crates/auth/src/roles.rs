use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use campus_core::{Entity, EntityId, TenantId};

use crate::{Module, PermissionSet};

/// Built-in role every principal carries.
///
/// System roles always exist; a tenant can widen or narrow their grants per
/// module through a [`CustomRole`], but never delete them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemRole {
    Admin,
    Teacher,
    Student,
    Parent,
}

impl SystemRole {
    pub const ALL: [SystemRole; 4] = [
        SystemRole::Admin,
        SystemRole::Teacher,
        SystemRole::Student,
        SystemRole::Parent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SystemRole::Admin => "admin",
            SystemRole::Teacher => "teacher",
            SystemRole::Student => "student",
            SystemRole::Parent => "parent",
        }
    }
}

impl core::fmt::Display for SystemRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explicit grant for one module inside a custom role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModulePermission {
    pub module: Module,
    #[serde(flatten)]
    pub grants: PermissionSet,
}

/// Tenant-defined role whose per-module entries override the defaults.
///
/// # Invariants
/// - A custom role is only ever consulted for principals of its own tenant.
/// - Records flagged `system` mirror a built-in role and cannot be deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomRole {
    pub id: EntityId,
    pub tenant_id: TenantId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<ModulePermission>,
    #[serde(default)]
    pub system: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CustomRole {
    pub fn new(tenant_id: TenantId, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: EntityId::new(),
            tenant_id,
            name: name.into(),
            description: None,
            permissions: Vec::new(),
            system: false,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_grant(mut self, module: Module, grants: PermissionSet) -> Self {
        self.set_grant(module, grants);
        self
    }

    /// Insert or replace the entry for `module`.
    pub fn set_grant(&mut self, module: Module, grants: PermissionSet) {
        match self.permissions.iter_mut().find(|p| p.module == module) {
            Some(entry) => entry.grants = grants,
            None => self.permissions.push(ModulePermission { module, grants }),
        }
    }

    /// Explicit entry for `module`, if this role has one.
    pub fn grants_for(&self, module: Module) -> Option<PermissionSet> {
        self.permissions
            .iter()
            .find(|p| p.module == module)
            .map(|p| p.grants)
    }
}

impl Entity for CustomRole {
    const COLLECTION: &'static str = "roles";

    fn id(&self) -> EntityId {
        self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_grant_replaces_existing_entry() {
        let mut role = CustomRole::new(TenantId::new(), "ReadOnlyTeacher", Utc::now())
            .with_grant(Module::Fees, PermissionSet::CONTRIBUTE);
        role.set_grant(Module::Fees, PermissionSet::VIEW_ONLY);

        assert_eq!(role.permissions.len(), 1);
        assert_eq!(role.grants_for(Module::Fees), Some(PermissionSet::VIEW_ONLY));
        assert_eq!(role.grants_for(Module::Exams), None);
    }

    #[test]
    fn module_permission_serializes_flat() {
        let entry = ModulePermission {
            module: Module::Fees,
            grants: PermissionSet::VIEW_ONLY,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["module"], "fees");
        assert_eq!(json["can_view"], true);
        assert_eq!(json["can_add"], false);
    }
}
