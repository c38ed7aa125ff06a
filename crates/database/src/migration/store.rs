//! Migration history storage.
//!
//! Each tenant schema carries its own history table; nothing is shared
//! between tenants. A session is one administrative connection pinned to one
//! schema for the duration of that schema's migration, holding that schema's
//! advisory lock from `open` until `close`.

use super::source::{Migration, MigrationVersion};
use crate::error::{DatabaseError, Result};
use crate::provider::{switch_schema, MultiTenantConnectionProvider, TenantConnection, TenantConnectionProvider};
use async_trait::async_trait;
use catalog_tenant::TenantIdentifier;
use sqlx::{Connection, Executor};
use std::time::Instant;

pub const DEFAULT_HISTORY_TABLE: &str = "schema_history";

/// One row of a schema's history table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    pub installed_rank: i32,
    pub version: MigrationVersion,
    pub description: String,
    pub checksum: String,
    pub success: bool,
}

#[async_trait]
pub trait MigrationStore: Send + Sync {
    type Session: MigrationSession;

    /// Prepare `schema` (create it and its history table if missing) and
    /// return a session bound to it.
    async fn open(&self, schema: &TenantIdentifier) -> Result<Self::Session>;
}

#[async_trait]
pub trait MigrationSession: Send {
    /// Recorded units in installation order.
    async fn history(&mut self) -> Result<Vec<MigrationRecord>>;

    /// Execute `migration` and record it as one atomic step. Returns `false`
    /// when the version turned out to be recorded already (another process
    /// got there first) and nothing was executed.
    async fn apply(&mut self, migration: &Migration) -> Result<bool>;

    /// End the session. Must be called on success and failure alike.
    async fn close(self) -> Result<()>;
}

/// PostgreSQL history store working through the tenant connection provider.
#[derive(Clone)]
pub struct PgMigrationStore {
    provider: TenantConnectionProvider,
    history_table: String,
}

impl PgMigrationStore {
    pub fn new(provider: TenantConnectionProvider) -> Self {
        Self {
            provider,
            history_table: format!("\"{}\"", DEFAULT_HISTORY_TABLE),
        }
    }

    /// Override the history table name; it must be a plain SQL identifier.
    pub fn with_history_table(mut self, table: &str) -> Result<Self> {
        let table = TenantIdentifier::new(table)
            .map_err(|e| DatabaseError::InvalidInput(format!("history table: {}", e)))?;
        self.history_table = table.quoted();
        Ok(self)
    }
}

#[async_trait]
impl MigrationStore for PgMigrationStore {
    type Session = PgMigrationSession;

    async fn open(&self, schema: &TenantIdentifier) -> Result<PgMigrationSession> {
        let mut conn = self.provider.get_any_connection().await?;

        // Held for the whole session; the schema DDL below races on the
        // catalog when two runners prepare the same schema.
        if let Err(e) = sqlx::query("SELECT pg_advisory_lock(hashtext($1))")
            .bind(schema.as_str())
            .execute(&mut *conn)
            .await
        {
            self.provider.release_any_connection(conn).await?;
            return Err(e.into());
        }

        let table = format!("{}.{}", schema.quoted(), self.history_table);
        if let Err(e) = prepare_schema(&mut conn, schema, &table).await {
            unlock_schema(&self.provider, schema, conn).await;
            return Err(e);
        }

        Ok(PgMigrationSession {
            provider: self.provider.clone(),
            schema: schema.clone(),
            table,
            conn,
        })
    }
}

async fn prepare_schema(conn: &mut TenantConnection, schema: &TenantIdentifier, table: &str) -> Result<()> {
    (&mut **conn)
        .execute(sqlx::raw_sql(&format!("CREATE SCHEMA IF NOT EXISTS {}", schema.quoted())))
        .await?;
    switch_schema(conn, schema).await?;

    (&mut **conn)
        .execute(sqlx::raw_sql(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            installed_rank INTEGER PRIMARY KEY,
            version VARCHAR(50) NOT NULL UNIQUE,
            description VARCHAR(200) NOT NULL,
            script VARCHAR(1000) NOT NULL,
            checksum VARCHAR(64) NOT NULL,
            installed_on TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            execution_time_ms INTEGER NOT NULL,
            success BOOLEAN NOT NULL
        )
        "#
    )))
    .await?;

    Ok(())
}

/// Release the schema's advisory lock and hand the connection back. A
/// connection that cannot be unlocked is closed instead, which ends the
/// server session and with it the lock.
async fn unlock_schema(provider: &TenantConnectionProvider, schema: &TenantIdentifier, mut conn: TenantConnection) {
    let unlocked = sqlx::query("SELECT pg_advisory_unlock(hashtext($1))")
        .bind(schema.as_str())
        .execute(&mut *conn)
        .await;

    match unlocked {
        Ok(_) => {
            if let Err(e) = provider.release_any_connection(conn).await {
                tracing::warn!("Failed to release migration connection (schema={}): {}", schema, e);
            }
        }
        Err(e) => {
            tracing::warn!(
                "Failed to release migration lock, closing connection (schema={}): {}",
                schema,
                e
            );
            conn.discard().await;
        }
    }
}

pub struct PgMigrationSession {
    provider: TenantConnectionProvider,
    schema: TenantIdentifier,
    table: String,
    conn: TenantConnection,
}

fn migration_failed(schema: &TenantIdentifier, migration: &Migration, error: impl ToString) -> DatabaseError {
    DatabaseError::MigrationFailed {
        schema: schema.to_string(),
        version: migration.version.to_string(),
        reason: error.to_string(),
    }
}

#[async_trait]
impl MigrationSession for PgMigrationSession {
    async fn history(&mut self) -> Result<Vec<MigrationRecord>> {
        let rows: Vec<(i32, String, String, String, bool)> = sqlx::query_as(&format!(
            "SELECT installed_rank, version, description, checksum, success FROM {} ORDER BY installed_rank",
            self.table
        ))
        .fetch_all(&mut *self.conn)
        .await?;

        rows.into_iter()
            .map(|(installed_rank, version, description, checksum, success)| {
                Ok(MigrationRecord {
                    installed_rank,
                    version: MigrationVersion::parse(&version)?,
                    description,
                    checksum,
                    success,
                })
            })
            .collect()
    }

    async fn apply(&mut self, migration: &Migration) -> Result<bool> {
        let schema = self.schema.clone();
        let table = self.table.clone();
        let mut tx = self.conn.begin().await?;

        let already: bool = sqlx::query_scalar(&format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE version = $1)",
            table
        ))
        .bind(migration.version.as_str())
        .fetch_one(&mut *tx)
        .await?;
        if already {
            return Ok(false);
        }

        let installed_rank: i32 = sqlx::query_scalar(&format!(
            "SELECT COALESCE(MAX(installed_rank), 0) + 1 FROM {}",
            table
        ))
        .fetch_one(&mut *tx)
        .await?;

        let started = Instant::now();
        if let Err(e) = (&mut *tx).execute(sqlx::raw_sql(&migration.sql)).await {
            return Err(migration_failed(&schema, migration, e));
        }
        let elapsed_ms = i32::try_from(started.elapsed().as_millis()).unwrap_or(i32::MAX);

        sqlx::query(&format!(
            r#"
            INSERT INTO {} (installed_rank, version, description, script, checksum, execution_time_ms, success)
            VALUES ($1, $2, $3, $4, $5, $6, TRUE)
            "#,
            table
        ))
        .bind(installed_rank)
        .bind(migration.version.as_str())
        .bind(&migration.description)
        .bind(&migration.script)
        .bind(&migration.checksum)
        .bind(elapsed_ms)
        .execute(&mut *tx)
        .await?;

        tx.commit()
            .await
            .map_err(|e| migration_failed(&schema, migration, e))?;
        Ok(true)
    }

    async fn close(self) -> Result<()> {
        unlock_schema(&self.provider, &self.schema, self.conn).await;
        Ok(())
    }
}
