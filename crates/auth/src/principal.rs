use serde::{Deserialize, Serialize};

use campus_core::{EntityId, TenantId, UserId};

use crate::{Module, SystemRole};

/// An authenticated actor, valid for the lifetime of its session.
///
/// The tenant is taken from the verified session credential, never from
/// request input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub name: String,
    pub role: SystemRole,
    #[serde(default)]
    pub custom_role_id: Option<EntityId>,
    /// When present, modules outside this list are denied outright.
    #[serde(default)]
    pub allowed_modules: Option<Vec<Module>>,
}

impl Principal {
    pub fn new(tenant_id: TenantId, user_id: UserId, name: impl Into<String>, role: SystemRole) -> Self {
        Self {
            user_id,
            tenant_id,
            name: name.into(),
            role,
            custom_role_id: None,
            allowed_modules: None,
        }
    }

    pub fn with_custom_role(mut self, custom_role_id: EntityId) -> Self {
        self.custom_role_id = Some(custom_role_id);
        self
    }

    pub fn with_allowed_modules(mut self, modules: Vec<Module>) -> Self {
        self.allowed_modules = Some(modules);
        self
    }

    pub fn module_allowed(&self, module: Module) -> bool {
        match &self.allowed_modules {
            Some(list) => list.contains(&module),
            None => true,
        }
    }
}
