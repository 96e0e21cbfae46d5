//! Immutable audit trail of mutations.
//!
//! Entries are written best-effort: the recorder never reports a failure to
//! the mutation path that produced the entry. Each entry carries its own
//! expiry and is purged once past it.

pub mod in_memory;
pub mod postgres;
pub mod recorder;
pub mod retention;

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use campus_auth::Session;
use campus_core::{EntityId, TenantId, UserId};

use crate::store::StoreError;

pub use in_memory::InMemoryAuditStore;
pub use postgres::PostgresAuditStore;
pub use recorder::AuditRecorder;
pub use retention::{RetentionHandle, RetentionSweeper};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Login,
    Logout,
    Export,
    Import,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
            AuditAction::Login => "login",
            AuditAction::Logout => "logout",
            AuditAction::Export => "export",
            AuditAction::Import => "import",
        }
    }
}

impl core::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An action name outside the fixed audit vocabulary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown audit action '{0}'")]
pub struct UnknownAuditAction(pub String);

impl FromStr for AuditAction {
    type Err = UnknownAuditAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(AuditAction::Create),
            "update" => Ok(AuditAction::Update),
            "delete" => Ok(AuditAction::Delete),
            "login" => Ok(AuditAction::Login),
            "logout" => Ok(AuditAction::Logout),
            "export" => Ok(AuditAction::Export),
            "import" => Ok(AuditAction::Import),
            other => Err(UnknownAuditAction(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub old: Value,
    pub new: Value,
}

/// Field name → old/new pair.
pub type Changes = BTreeMap<String, FieldChange>;

/// Who performed the audited action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub name: String,
    pub role: String,
}

impl From<&Session> for Actor {
    fn from(session: &Session) -> Self {
        let principal = session.principal();
        Self {
            id: principal.user_id,
            name: principal.name.clone(),
            role: principal.role.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: EntityId,
    pub tenant_id: TenantId,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: String,
    pub actor_id: UserId,
    pub actor_name: String,
    pub actor_role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<Changes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Input to [`AuditRecorder::audit`].
#[derive(Debug, Clone)]
pub struct AuditParams {
    pub tenant_id: TenantId,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: String,
    pub actor: Actor,
    pub changes: Option<Changes>,
    pub metadata: Option<Value>,
}

impl AuditParams {
    /// Params for an action performed by the session's principal in its own tenant.
    pub fn by(session: &Session, action: AuditAction, entity_type: impl Into<String>, entity_id: impl ToString) -> Self {
        Self {
            tenant_id: session.tenant_id(),
            action,
            entity_type: entity_type.into(),
            entity_id: entity_id.to_string(),
            actor: Actor::from(session),
            changes: None,
            metadata: None,
        }
    }

    pub fn with_changes(mut self, changes: Option<Changes>) -> Self {
        self.changes = changes;
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Field-level diff between two versions of a record.
///
/// For each named field whose new value is present and whose stringified
/// value differs from the old one, records `{old, new}`. Returns `None` when
/// nothing changed so callers can skip a no-op entry. The two sides may be
/// different types; a creation diffs against `Value::Null`.
pub fn build_changes<O, N>(old: &O, new: &N, fields: &[&str]) -> Option<Changes>
where
    O: Serialize + ?Sized,
    N: Serialize + ?Sized,
{
    let (old, new) = match (serde_json::to_value(old), serde_json::to_value(new)) {
        (Ok(old), Ok(new)) => (old, new),
        _ => {
            tracing::warn!("audit diff skipped: record did not serialize");
            return None;
        }
    };

    let mut changes = Changes::new();
    for field in fields {
        let Some(new_value) = new.get(*field) else {
            continue;
        };
        let old_value = old.get(*field).cloned().unwrap_or(Value::Null);
        if old_value.to_string() != new_value.to_string() {
            changes.insert(
                (*field).to_string(),
                FieldChange {
                    old: old_value,
                    new: new_value.clone(),
                },
            );
        }
    }

    if changes.is_empty() { None } else { Some(changes) }
}

/// Listing filter for a tenant's audit trail. Results are newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditQuery {
    pub action: Option<AuditAction>,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub limit: usize,
}

impl AuditQuery {
    pub const DEFAULT_LIMIT: usize = 100;
    pub const MAX_LIMIT: usize = 1000;

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.clamp(1, Self::MAX_LIMIT);
        self
    }

    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.action.is_none_or(|a| a == entry.action)
            && self.entity_type.as_deref().is_none_or(|t| t == entry.entity_type)
            && self.entity_id.as_deref().is_none_or(|id| id == entry.entity_id)
    }
}

impl Default for AuditQuery {
    fn default() -> Self {
        Self {
            action: None,
            entity_type: None,
            entity_id: None,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, entry: AuditEntry) -> Result<(), StoreError>;

    async fn list(&self, tenant_id: TenantId, query: &AuditQuery) -> Result<Vec<AuditEntry>, StoreError>;

    /// Remove every entry whose `expires_at` is at or before `now`.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditSettings {
    pub retention_days: u32,
    pub purge_interval: Duration,
    pub write_timeout: Duration,
}

impl AuditSettings {
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.retention_days))
    }
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            retention_days: 365,
            purge_interval: Duration::from_secs(3600),
            write_timeout: Duration::from_millis(2000),
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde::Serialize;
    use serde_json::json;

    use super::*;

    #[derive(Serialize, Clone)]
    struct Record {
        name: String,
        code: Option<String>,
        periods: u32,
    }

    #[test]
    fn identical_records_produce_no_diff() {
        let r = Record { name: "Physics".into(), code: None, periods: 4 };
        assert_eq!(build_changes(&r, &r.clone(), &["name", "code", "periods"]), None);
    }

    #[test]
    fn only_named_fields_are_diffed() {
        let old = Record { name: "Physics".into(), code: None, periods: 4 };
        let new = Record { name: "Physics II".into(), code: Some("PHY2".into()), periods: 5 };

        let changes = build_changes(&old, &new, &["name", "code"]).unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes["name"], FieldChange { old: json!("Physics"), new: json!("Physics II") });
        assert_eq!(changes["code"], FieldChange { old: Value::Null, new: json!("PHY2") });
        assert!(!changes.contains_key("periods"));
    }

    #[test]
    fn fields_absent_from_new_record_are_skipped() {
        let old = Record { name: "A".into(), code: None, periods: 1 };
        let new = Record { name: "B".into(), code: None, periods: 1 };
        let changes = build_changes(&old, &new, &["name", "missing"]).unwrap();
        assert_eq!(changes.keys().collect::<Vec<_>>(), vec!["name"]);
    }

    #[test]
    fn query_filters_compose() {
        let entry = AuditEntry {
            id: EntityId::new(),
            tenant_id: TenantId::new(),
            action: AuditAction::Delete,
            entity_type: "teacher".into(),
            entity_id: "t1".into(),
            actor_id: UserId::new(),
            actor_name: "Admin".into(),
            actor_role: "admin".into(),
            changes: None,
            metadata: None,
            created_at: Utc::now(),
            expires_at: Utc::now(),
        };

        assert!(AuditQuery::default().matches(&entry));
        let q = AuditQuery { action: Some(AuditAction::Delete), entity_type: Some("teacher".into()), ..Default::default() };
        assert!(q.matches(&entry));
        let q = AuditQuery { action: Some(AuditAction::Update), ..Default::default() };
        assert!(!q.matches(&entry));
    }

    #[test]
    fn action_names_round_trip_through_from_str() {
        for action in [AuditAction::Create, AuditAction::Export, AuditAction::Import] {
            assert_eq!(action.as_str().parse::<AuditAction>().unwrap(), action);
        }
        assert_eq!(
            "purge".parse::<AuditAction>(),
            Err(UnknownAuditAction("purge".to_string()))
        );
        assert_eq!(
            "Create".parse::<AuditAction>().unwrap_err().to_string(),
            "unknown audit action 'Create'"
        );
    }

    proptest! {
        #[test]
        fn diff_is_deterministic_and_empty_on_equal(name in "[a-z]{0,12}", periods in 0u32..50, other in 0u32..50) {
            let old = Record { name: name.clone(), code: None, periods };
            let new = Record { name, code: None, periods: other };
            let fields = ["name", "code", "periods"];

            let first = build_changes(&old, &new, &fields);
            prop_assert_eq!(&first, &build_changes(&old, &new, &fields));
            prop_assert_eq!(first.is_none(), periods == other);
        }
    }
}
