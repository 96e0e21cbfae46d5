//! Lazily-established, shared Postgres connection.
//!
//! The first caller to need the database connects and bootstraps the schema;
//! concurrent first callers wait on that single attempt instead of opening
//! pools of their own. A failed attempt leaves the cell empty so the next
//! caller retries.

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::info;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS documents (
        tenant_id   UUID        NOT NULL,
        collection  TEXT        NOT NULL,
        id          UUID        NOT NULL,
        body        JSONB       NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (tenant_id, collection, id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS documents_body_gin ON documents USING GIN (body jsonb_path_ops)",
    r#"
    CREATE TABLE IF NOT EXISTS audit_logs (
        id          UUID        PRIMARY KEY,
        tenant_id   UUID        NOT NULL,
        action      TEXT        NOT NULL,
        entity_type TEXT        NOT NULL,
        entity_id   TEXT        NOT NULL,
        actor_id    UUID        NOT NULL,
        actor_name  TEXT        NOT NULL,
        actor_role  TEXT        NOT NULL,
        changes     JSONB,
        metadata    JSONB,
        created_at  TIMESTAMPTZ NOT NULL,
        expires_at  TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS audit_logs_tenant_created ON audit_logs (tenant_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS audit_logs_expires ON audit_logs (expires_at)",
];

#[derive(Debug)]
pub struct ConnectionManager {
    url: String,
    max_connections: u32,
    pool: OnceCell<PgPool>,
}

impl ConnectionManager {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            pool: OnceCell::new(),
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// The shared pool, connecting on first use.
    pub async fn pool(&self) -> Result<&PgPool, DatabaseError> {
        self.pool
            .get_or_try_init(|| async {
                let pool = PgPoolOptions::new()
                    .max_connections(self.max_connections)
                    .acquire_timeout(Duration::from_secs(5))
                    .connect(&self.url)
                    .await?;
                bootstrap(&pool).await?;
                info!(max_connections = self.max_connections, "database pool ready");
                Ok::<PgPool, DatabaseError>(pool)
            })
            .await
    }

    pub fn is_connected(&self) -> bool {
        self.pool.initialized()
    }

    /// Ping the database, connecting first if needed.
    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        let pool = self.pool().await?;
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(())
    }
}

async fn bootstrap(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
