//! Postgres-backed audit trail (`audit_logs` table, see [`crate::db`]).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, QueryBuilder};
use tracing::instrument;

use campus_core::{EntityId, TenantId, UserId};

use super::{AuditEntry, AuditQuery, AuditStore, Changes, UnknownAuditAction};
use crate::db::ConnectionManager;
use crate::store::StoreError;
use crate::store::postgres::map_sqlx_error;

#[derive(Debug, Clone)]
pub struct PostgresAuditStore {
    db: Arc<ConnectionManager>,
}

impl PostgresAuditStore {
    pub fn new(db: Arc<ConnectionManager>) -> Self {
        Self { db }
    }

    async fn pool(&self) -> Result<&PgPool, StoreError> {
        self.db
            .pool()
            .await
            .map_err(|e| StoreError::Backend(format!("database unavailable: {}", e)))
    }
}

#[derive(Debug, FromRow)]
struct AuditRow {
    id: uuid::Uuid,
    tenant_id: uuid::Uuid,
    action: String,
    entity_type: String,
    entity_id: String,
    actor_id: uuid::Uuid,
    actor_name: String,
    actor_role: String,
    changes: Option<Json<Changes>>,
    metadata: Option<Value>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = StoreError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        Ok(AuditEntry {
            id: EntityId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            action: row.action.parse().map_err(|e: UnknownAuditAction| StoreError::Serialization(e.to_string()))?,
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            actor_id: UserId::from_uuid(row.actor_id),
            actor_name: row.actor_name,
            actor_role: row.actor_role,
            changes: row.changes.map(|Json(c)| c),
            metadata: row.metadata,
            created_at: row.created_at,
            expires_at: row.expires_at,
        })
    }
}

#[async_trait]
impl AuditStore for PostgresAuditStore {
    #[instrument(skip(self, entry), fields(tenant_id = %entry.tenant_id, action = %entry.action), err)]
    async fn append(&self, entry: AuditEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (
                id, tenant_id, action, entity_type, entity_id,
                actor_id, actor_name, actor_role, changes, metadata,
                created_at, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.tenant_id.as_uuid())
        .bind(entry.action.as_str())
        .bind(&entry.entity_type)
        .bind(&entry.entity_id)
        .bind(entry.actor_id.as_uuid())
        .bind(&entry.actor_name)
        .bind(&entry.actor_role)
        .bind(entry.changes.as_ref().map(Json))
        .bind(entry.metadata.as_ref().map(Json))
        .bind(entry.created_at)
        .bind(entry.expires_at)
        .execute(self.pool().await?)
        .await
        .map_err(|e| map_sqlx_error("append_audit", e))?;
        Ok(())
    }

    #[instrument(skip(self, query), fields(tenant_id = %tenant_id), err)]
    async fn list(&self, tenant_id: TenantId, query: &AuditQuery) -> Result<Vec<AuditEntry>, StoreError> {
        let mut qb = QueryBuilder::new("SELECT * FROM audit_logs WHERE tenant_id = ");
        qb.push_bind(*tenant_id.as_uuid());
        if let Some(action) = query.action {
            qb.push(" AND action = ");
            qb.push_bind(action.as_str());
        }
        if let Some(entity_type) = &query.entity_type {
            qb.push(" AND entity_type = ");
            qb.push_bind(entity_type.clone());
        }
        if let Some(entity_id) = &query.entity_id {
            qb.push(" AND entity_id = ");
            qb.push_bind(entity_id.clone());
        }
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        qb.push_bind(query.limit as i64);

        let rows: Vec<AuditRow> = qb
            .build_query_as()
            .fetch_all(self.pool().await?)
            .await
            .map_err(|e| map_sqlx_error("list_audit", e))?;

        rows.into_iter().map(AuditEntry::try_from).collect()
    }

    #[instrument(skip(self), err)]
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM audit_logs WHERE expires_at <= $1")
            .bind(now)
            .execute(self.pool().await?)
            .await
            .map_err(|e| map_sqlx_error("purge_audit", e))?;
        Ok(result.rows_affected())
    }
}
