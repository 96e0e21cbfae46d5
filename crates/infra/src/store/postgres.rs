//! Postgres-backed document store.
//!
//! All collections share a single `documents` table keyed by
//! `(tenant_id, collection, id)` with the record held in a `jsonb` body.
//! Filters compile to `body @> $n` containment checks, one per condition,
//! which the GIN index on `body` serves.
//!
//! ## Tenant Isolation
//!
//! Every statement binds `tenant_id` in its WHERE clause or primary key.

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::types::Json;
use std::sync::Arc;

use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::instrument;

use campus_core::{EntityId, TenantId};

use super::{Condition, DocumentStore, Filter, StoreError, Update};

use crate::db::ConnectionManager;

#[derive(Debug, Clone)]
pub struct PostgresDocumentStore {
    db: Arc<ConnectionManager>,
}

impl PostgresDocumentStore {
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

/// Containment document for one condition.
///
/// `Eq` on scalars and `null` behaves exactly like [`Condition::matches`];
/// array-valued `Eq` degrades to containment, which no caller relies on.
fn containment(condition: &Condition) -> Value {
    let mut obj = Map::new();
    match condition {
        Condition::Eq(field, value) => {
            obj.insert(field.clone(), value.clone());
        }
        Condition::Contains(field, value) => {
            obj.insert(field.clone(), Value::Array(vec![value.clone()]));
        }
    }
    Value::Object(obj)
}

fn scoped<'a>(prefix: &str, tenant_id: TenantId, collection: &'a str, filter: &Filter) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::new(prefix);
    qb.push(" WHERE tenant_id = ");
    qb.push_bind(*tenant_id.as_uuid());
    qb.push(" AND collection = ");
    qb.push_bind(collection);
    for condition in filter.conditions() {
        qb.push(" AND body @> ");
        qb.push_bind(Json(containment(condition)));
    }
    qb
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn get(&self, tenant_id: TenantId, collection: &str, id: EntityId) -> Result<Option<Value>, StoreError> {
        let row = sqlx::query("SELECT body FROM documents WHERE tenant_id = $1 AND collection = $2 AND id = $3")
            .bind(tenant_id.as_uuid())
            .bind(collection)
            .bind(id.as_uuid())
            .fetch_optional(self.pool().await?)
            .await
            .map_err(|e| map_sqlx_error("get", e))?;

        row.map(|r| r.try_get::<Value, _>("body"))
            .transpose()
            .map_err(|e| map_sqlx_error("get", e))
    }

    #[instrument(skip(self, filter), fields(tenant_id = %tenant_id), err)]
    async fn find(&self, tenant_id: TenantId, collection: &str, filter: &Filter) -> Result<Vec<Value>, StoreError> {
        let mut qb = scoped("SELECT body FROM documents", tenant_id, collection, filter);
        qb.push(" ORDER BY id ASC");

        let rows = qb
            .build()
            .fetch_all(self.pool().await?)
            .await
            .map_err(|e| map_sqlx_error("find", e))?;

        rows.iter()
            .map(|r| r.try_get::<Value, _>("body"))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("find", e))
    }

    #[instrument(skip(self, filter), fields(tenant_id = %tenant_id), err)]
    async fn count(&self, tenant_id: TenantId, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let mut qb = scoped("SELECT COUNT(*) AS n FROM documents", tenant_id, collection, filter);
        let row = qb
            .build()
            .fetch_one(self.pool().await?)
            .await
            .map_err(|e| map_sqlx_error("count", e))?;
        let n: i64 = row.try_get("n").map_err(|e| map_sqlx_error("count", e))?;
        Ok(n.max(0) as u64)
    }

    #[instrument(skip(self, doc), fields(tenant_id = %tenant_id), err)]
    async fn insert(&self, tenant_id: TenantId, collection: &str, id: EntityId, doc: Value) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO documents (tenant_id, collection, id, body)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(collection)
        .bind(id.as_uuid())
        .bind(Json(doc))
        .execute(self.pool().await?)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::AlreadyExists {
                    collection: collection.to_string(),
                    id,
                }
            } else {
                map_sqlx_error("insert", e)
            }
        })?;
        Ok(())
    }

    #[instrument(skip(self, doc, unique), fields(tenant_id = %tenant_id), err)]
    async fn upsert_unique(
        &self,
        tenant_id: TenantId,
        collection: &str,
        id: EntityId,
        doc: Value,
        unique: &Filter,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool().await?.begin().await.map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // Serialize writers per tenant collection for the check-then-write below.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(format!("{}:{}", tenant_id, collection))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("advisory_lock", e))?;

        let mut qb = scoped("SELECT COUNT(*) AS n FROM documents", tenant_id, collection, unique);
        qb.push(" AND id <> ");
        qb.push_bind(*id.as_uuid());
        let row = qb
            .build()
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("upsert_unique", e))?;
        let clashes: i64 = row.try_get("n").map_err(|e| map_sqlx_error("upsert_unique", e))?;
        if clashes > 0 {
            return Err(StoreError::Duplicate(format!("{collection} already holds a matching record")));
        }

        sqlx::query(
            r#"
            INSERT INTO documents (tenant_id, collection, id, body)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (tenant_id, collection, id)
            DO UPDATE SET body = EXCLUDED.body, updated_at = NOW()
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(collection)
        .bind(id.as_uuid())
        .bind(Json(doc))
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("upsert_unique", e))?;

        tx.commit().await.map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    #[instrument(skip(self, doc), fields(tenant_id = %tenant_id), err)]
    async fn replace(&self, tenant_id: TenantId, collection: &str, id: EntityId, doc: Value) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE documents SET body = $4, updated_at = NOW()
            WHERE tenant_id = $1 AND collection = $2 AND id = $3
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(collection)
        .bind(id.as_uuid())
        .bind(Json(doc))
        .execute(self.pool().await?)
        .await
        .map_err(|e| map_sqlx_error("replace", e))?;
        Ok(result.rows_affected() > 0)
    }

    /// Locks the matching rows, applies the update in process and writes back
    /// only documents that actually changed.
    #[instrument(skip(self, filter, update), fields(tenant_id = %tenant_id), err)]
    async fn update_many(
        &self,
        tenant_id: TenantId,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<u64, StoreError> {
        let mut tx = self.pool().await?.begin().await.map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let mut qb = scoped("SELECT id, body FROM documents", tenant_id, collection, filter);
        qb.push(" FOR UPDATE");
        let rows = qb
            .build()
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_many", e))?;

        let mut changed = 0u64;
        for row in rows {
            let id: uuid::Uuid = row.try_get("id").map_err(|e| map_sqlx_error("update_many", e))?;
            let mut body: Value = row.try_get("body").map_err(|e| map_sqlx_error("update_many", e))?;
            if !update.apply(&mut body) {
                continue;
            }

            sqlx::query(
                r#"
                UPDATE documents SET body = $4, updated_at = NOW()
                WHERE tenant_id = $1 AND collection = $2 AND id = $3
                "#,
            )
            .bind(tenant_id.as_uuid())
            .bind(collection)
            .bind(id)
            .bind(Json(body))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_many", e))?;
            changed += 1;
        }

        tx.commit().await.map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(changed)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn delete(&self, tenant_id: TenantId, collection: &str, id: EntityId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM documents WHERE tenant_id = $1 AND collection = $2 AND id = $3")
            .bind(tenant_id.as_uuid())
            .bind(collection)
            .bind(id.as_uuid())
            .execute(self.pool().await?)
            .await
            .map_err(|e| map_sqlx_error("delete", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, filter), fields(tenant_id = %tenant_id), err)]
    async fn delete_many(&self, tenant_id: TenantId, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let mut qb = scoped("DELETE FROM documents", tenant_id, collection, filter);
        let result = qb
            .build()
            .execute(self.pool().await?)
            .await
            .map_err(|e| map_sqlx_error("delete_many", e))?;
        Ok(result.rows_affected())
    }
}

/// Map SQLx errors to StoreError.
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Duplicate(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            StoreError::Backend(format!("connection pool unavailable in {}", operation))
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Serialization(format!("failed to decode row in {}: {}", operation, err))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().as_deref() == Some("23505");
    }
    false
}
