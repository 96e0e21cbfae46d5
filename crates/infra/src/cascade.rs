//! Cascade Coordinator: applies the school's cascade and delete-guard rule
//! tables to a tenant's stored dependents.
//!
//! Cascades never fail the caller. Each rule runs on its own and its failure
//! is logged and reported in the summary while the other rules proceed. A
//! rule's filter only matches dependents still pointing at the parent, so a
//! second run over an already-cascaded parent changes nothing.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use campus_core::{EntityId, TenantId};
use campus_school::{
    CascadeAction, CascadeRule, Cleared, DeleteGuardRule, DependentKind, ParentKind, Reference,
    cascade_rules, delete_guards,
};

use crate::store::{DocumentStore, Filter, StoreError, Update};

/// Dependents touched by one rule (or summed across rules of a kind).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CascadeCount {
    pub updated: u64,
    pub removed: u64,
}

impl CascadeCount {
    pub fn is_zero(&self) -> bool {
        self.updated == 0 && self.removed == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CascadeSummary {
    pub counts: BTreeMap<DependentKind, CascadeCount>,
    /// Names of rules that failed, e.g. `teacher->subject`.
    pub failed: Vec<String>,
}

impl CascadeSummary {
    pub fn count(&self, kind: DependentKind) -> CascadeCount {
        self.counts.get(&kind).copied().unwrap_or_default()
    }

    /// Nothing changed and nothing failed.
    pub fn is_noop(&self) -> bool {
        self.failed.is_empty() && self.counts.values().all(CascadeCount::is_zero)
    }

    /// Shape folded into the audit entry's metadata.
    pub fn to_metadata(&self) -> Value {
        json!({ "cascade": self })
    }
}

/// Why a hard delete was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteBlock {
    pub count: u64,
    pub reason: String,
}

#[derive(Clone)]
pub struct CascadeCoordinator {
    store: Arc<dyn DocumentStore>,
}

fn id_value(id: EntityId) -> Value {
    Value::String(id.to_string())
}

fn reference_filter(reference: Reference, parent_id: EntityId) -> Filter {
    match reference {
        Reference::Field(field) => Filter::new().eq(field, id_value(parent_id)),
        Reference::ArrayMember(field) => Filter::new().contains(field, id_value(parent_id)),
    }
}

impl CascadeCoordinator {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Run every rule registered for `parent` concurrently.
    pub async fn cascade_on_deactivate(
        &self,
        parent: ParentKind,
        parent_id: EntityId,
        tenant_id: TenantId,
        at: DateTime<Utc>,
    ) -> CascadeSummary {
        let rules: Vec<&CascadeRule> = cascade_rules(parent).collect();
        let outcomes = join_all(
            rules
                .iter()
                .map(|rule| self.run_rule(rule, parent_id, tenant_id, at)),
        )
        .await;

        let mut summary = CascadeSummary::default();
        for (rule, outcome) in rules.iter().zip(outcomes) {
            match outcome {
                Ok(count) => {
                    let total = summary.counts.entry(rule.dependent).or_default();
                    total.updated += count.updated;
                    total.removed += count.removed;
                }
                Err(e) => {
                    warn!(
                        tenant_id = %tenant_id,
                        parent_id = %parent_id,
                        rule = %rule.name(),
                        error = %e,
                        "cascade rule failed"
                    );
                    summary.failed.push(rule.name());
                }
            }
        }

        debug!(tenant_id = %tenant_id, parent = %parent, parent_id = %parent_id, ?summary, "cascade complete");
        summary
    }

    /// Apply a single rule. Safe to retry.
    pub async fn run_rule(
        &self,
        rule: &CascadeRule,
        parent_id: EntityId,
        tenant_id: TenantId,
        at: DateTime<Utc>,
    ) -> Result<CascadeCount, StoreError> {
        let mut filter = reference_filter(rule.reference, parent_id);
        if rule.only_active {
            filter = filter.eq("active", true);
        }
        let collection = rule.dependent.collection();

        match rule.action {
            CascadeAction::Delete => {
                let removed = self.store.delete_many(tenant_id, collection, &filter).await?;
                Ok(CascadeCount { updated: 0, removed })
            }
            CascadeAction::Nullify { fields } => {
                let mut update = Update::new();
                for (field, cleared) in fields {
                    let value = match cleared {
                        Cleared::Null => Value::Null,
                        Cleared::EmptyString => Value::String(String::new()),
                    };
                    update = update.set(*field, value);
                }
                let update = stamp(update, rule.dependent, at);
                let updated = self.store.update_many(tenant_id, collection, &filter, &update).await?;
                Ok(CascadeCount { updated, removed: 0 })
            }
            CascadeAction::Pull => {
                let update = stamp(
                    Update::new().pull(rule.reference.field(), id_value(parent_id)),
                    rule.dependent,
                    at,
                );
                let updated = self.store.update_many(tenant_id, collection, &filter, &update).await?;
                Ok(CascadeCount { updated, removed: 0 })
            }
        }
    }

    /// Human-readable reason the parent must not be hard-deleted, or `None`
    /// when it is safe to delete.
    pub async fn guard_before_delete(
        &self,
        parent: ParentKind,
        parent_id: EntityId,
        tenant_id: TenantId,
    ) -> Option<String> {
        self.check_delete(parent, parent_id, tenant_id).await.map(|b| b.reason)
    }

    /// Like [`CascadeCoordinator::guard_before_delete`] but keeps the count.
    ///
    /// A guard that cannot count its dependents blocks the delete.
    pub async fn check_delete(&self, parent: ParentKind, parent_id: EntityId, tenant_id: TenantId) -> Option<DeleteBlock> {
        for guard in delete_guards(parent) {
            match self.count_blocking(guard, parent_id, tenant_id).await {
                Ok(0) => continue,
                Ok(count) => {
                    return Some(DeleteBlock {
                        count,
                        reason: guard.blocking_reason(count),
                    });
                }
                Err(e) => {
                    warn!(
                        tenant_id = %tenant_id,
                        parent_id = %parent_id,
                        dependent = %guard.dependent,
                        error = %e,
                        "delete guard could not count dependents"
                    );
                    return Some(DeleteBlock {
                        count: 0,
                        reason: format!(
                            "cannot delete {}: unable to verify dependent {} records, try again later.",
                            parent, guard.dependent
                        ),
                    });
                }
            }
        }
        None
    }

    async fn count_blocking(&self, guard: &DeleteGuardRule, parent_id: EntityId, tenant_id: TenantId) -> Result<u64, StoreError> {
        let filter = reference_filter(guard.reference, parent_id).eq("active", true);
        self.store.count(tenant_id, guard.dependent.collection(), &filter).await
    }
}

fn stamp(update: Update, kind: DependentKind, at: DateTime<Utc>) -> Update {
    if kind.tracks_updates() {
        update.set("updated_at", Value::String(at.to_rfc3339()))
    } else {
        update
    }
}
