use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use campus_auth::{CustomRole, ModulePermission, Principal, Session};
use campus_core::{DomainError, DomainResult, EntityId};

use crate::audit::{AuditAction, AuditParams, AuditRecorder, build_changes};
use crate::store::{DocumentStore, Filter, Repository};

const AUDITED_FIELDS: &[&str] = &["name", "description", "permissions", "active"];

#[derive(Debug, Clone, Deserialize)]
pub struct NewRole {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<ModulePermission>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Replaces the whole permission list when present.
    #[serde(default)]
    pub permissions: Option<Vec<ModulePermission>>,
    #[serde(default)]
    pub active: Option<bool>,
}

/// Tenant-defined custom roles.
#[derive(Clone)]
pub struct RoleService {
    repo: Repository<CustomRole>,
    audit: AuditRecorder,
}

fn name_filter(name: &str) -> Filter {
    Filter::new().eq("name", name.to_string())
}

fn validate_name(name: &str) -> DomainResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("role name must not be empty"));
    }
    Ok(name.to_string())
}

impl RoleService {
    pub fn new(store: Arc<dyn DocumentStore>, audit: AuditRecorder) -> Self {
        Self {
            repo: Repository::new(store),
            audit,
        }
    }

    pub async fn list(&self, session: &Session) -> DomainResult<Vec<CustomRole>> {
        self.repo.find(session.tenant_id(), &Filter::new()).await
    }

    pub async fn get(&self, session: &Session, id: EntityId) -> DomainResult<CustomRole> {
        self.repo.require(session.tenant_id(), id).await
    }

    /// Role names are unique within a tenant.
    pub async fn create(&self, session: &Session, input: NewRole) -> DomainResult<CustomRole> {
        let name = validate_name(&input.name)?;
        let mut role = CustomRole::new(session.tenant_id(), name, Utc::now());
        role.description = input.description;
        for entry in input.permissions {
            role.set_grant(entry.module, entry.grants);
        }

        self.repo
            .upsert_unique(&role, &name_filter(&role.name))
            .await
            .map_err(|e| match e {
                DomainError::Conflict(_) => DomainError::conflict(format!("role '{}' already exists", role.name)),
                other => other,
            })?;

        info!(tenant_id = %role.tenant_id, role_id = %role.id, name = %role.name, "custom role created");
        self.audit.audit(
            AuditParams::by(session, AuditAction::Create, "role", role.id)
                .with_changes(build_changes(&serde_json::Value::Null, &role, AUDITED_FIELDS)),
        );
        Ok(role)
    }

    pub async fn update(&self, session: &Session, id: EntityId, input: RoleUpdate) -> DomainResult<CustomRole> {
        let before = self.repo.require(session.tenant_id(), id).await?;
        let mut role = before.clone();

        if let Some(name) = input.name {
            role.name = validate_name(&name)?;
        }
        if let Some(description) = input.description {
            role.description = Some(description);
        }
        if let Some(permissions) = input.permissions {
            role.permissions.clear();
            for entry in permissions {
                role.set_grant(entry.module, entry.grants);
            }
        }
        if let Some(active) = input.active {
            role.active = active;
        }
        role.updated_at = Utc::now();

        self.repo
            .upsert_unique(&role, &name_filter(&role.name))
            .await
            .map_err(|e| match e {
                DomainError::Conflict(_) => DomainError::conflict(format!("role '{}' already exists", role.name)),
                other => other,
            })?;

        if let Some(changes) = build_changes(&before, &role, AUDITED_FIELDS) {
            self.audit
                .audit(AuditParams::by(session, AuditAction::Update, "role", id).with_changes(Some(changes)));
        }
        Ok(role)
    }

    /// Delete a custom role. Roles mirroring a built-in role cannot be deleted.
    pub async fn delete(&self, session: &Session, id: EntityId) -> DomainResult<()> {
        let role = self.repo.require(session.tenant_id(), id).await?;
        if role.system {
            return Err(DomainError::conflict(format!(
                "'{}' is a system role and cannot be deleted",
                role.name
            )));
        }

        self.repo.delete(session.tenant_id(), id).await?;
        info!(tenant_id = %role.tenant_id, role_id = %id, name = %role.name, "custom role deleted");
        self.audit.audit(
            AuditParams::by(session, AuditAction::Delete, "role", id)
                .with_metadata(serde_json::json!({ "name": role.name })),
        );
        Ok(())
    }

    /// The custom role referenced by `principal`, if it exists and is active.
    ///
    /// Lookup failures fall back to `None` (default matrix) and are logged.
    pub async fn load_for_principal(&self, principal: &Principal) -> Option<CustomRole> {
        let id = principal.custom_role_id?;
        match self.repo.get(principal.tenant_id, id).await {
            Ok(Some(role)) if role.active => Some(role),
            Ok(_) => None,
            Err(e) => {
                warn!(tenant_id = %principal.tenant_id, role_id = %id, error = %e, "custom role lookup failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use campus_auth::{Module, PermissionSet, SystemRole};
    use campus_core::UserId;

    use super::*;
    use crate::services::fixtures::World;

    fn read_only_teacher() -> NewRole {
        NewRole {
            name: "ReadOnlyTeacher".into(),
            description: None,
            permissions: vec![ModulePermission {
                module: Module::Fees,
                grants: PermissionSet::VIEW_ONLY,
            }],
        }
    }

    #[tokio::test]
    async fn role_names_are_unique_per_tenant() {
        let world = World::new();
        let roles = RoleService::new(world.store.clone(), world.recorder.clone());

        roles.create(&world.session(SystemRole::Admin), read_only_teacher()).await.unwrap();
        let err = roles.create(&world.session(SystemRole::Admin), read_only_teacher()).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        roles.create(&world.foreign_session(), read_only_teacher()).await.unwrap();
    }

    #[tokio::test]
    async fn system_roles_cannot_be_deleted() {
        let world = World::new();
        let admin = world.session(SystemRole::Admin);
        let roles = RoleService::new(world.store.clone(), world.recorder.clone());

        let mut system = CustomRole::new(world.tenant, "teacher", Utc::now());
        system.system = true;
        Repository::<CustomRole>::new(world.store.clone()).insert(&system).await.unwrap();

        let err = roles.delete(&admin, system.id).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        let custom = roles.create(&admin, read_only_teacher()).await.unwrap();
        roles.delete(&admin, custom.id).await.unwrap();
        assert_eq!(roles.get(&admin, custom.id).await.unwrap_err(), DomainError::NotFound);
    }

    #[tokio::test]
    async fn principals_only_pick_up_active_roles_of_their_tenant() {
        let world = World::new();
        let admin = world.session(SystemRole::Admin);
        let roles = RoleService::new(world.store.clone(), world.recorder.clone());
        let role = roles.create(&admin, read_only_teacher()).await.unwrap();

        let teacher = Principal::new(world.tenant, UserId::new(), "T", SystemRole::Teacher).with_custom_role(role.id);
        assert_eq!(roles.load_for_principal(&teacher).await.map(|r| r.id), Some(role.id));

        let outsider = Principal::new(campus_core::TenantId::new(), UserId::new(), "X", SystemRole::Teacher)
            .with_custom_role(role.id);
        assert!(roles.load_for_principal(&outsider).await.is_none());

        roles
            .update(&admin, role.id, RoleUpdate { active: Some(false), ..Default::default() })
            .await
            .unwrap();
        assert!(roles.load_for_principal(&teacher).await.is_none());
    }
}
