//! Tenant-aware connection provider
//!
//! Hands out pooled PostgreSQL connections whose `search_path` is pinned to a
//! tenant schema. The pool is shared by every tenant, so a session may carry a
//! previous tenant's `search_path`; acquisition therefore always rewrites it
//! before the caller sees the connection, and nothing trusts prior state.

use crate::error::{DatabaseError, Result};
use async_trait::async_trait;
use catalog_tenant::{CurrentTenantResolver, TenantIdentifier, TenantIdentifierResolver};
use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, PgPool, Postgres};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Connection acquisition seam used by repositories and the migration runner.
#[async_trait]
pub trait MultiTenantConnectionProvider: Send + Sync {
    type Connection: Send;

    /// Resolver deciding which tenant the running unit of work belongs to.
    fn resolver(&self) -> &dyn CurrentTenantResolver;

    /// Connection with no tenant binding, for administrative work.
    async fn get_any_connection(&self) -> Result<Self::Connection>;

    async fn release_any_connection(&self, connection: Self::Connection) -> Result<()>;

    /// Connection switched to `tenant`'s schema.
    async fn get_connection(&self, tenant: &TenantIdentifier) -> Result<Self::Connection>;

    async fn release_connection(
        &self,
        tenant: &TenantIdentifier,
        connection: Self::Connection,
    ) -> Result<()>;

    /// Callers must hold one connection for the whole unit of work; the
    /// provider never reclaims it mid-transaction.
    fn supports_aggressive_release(&self) -> bool {
        false
    }

    /// Connection for whichever tenant the resolver reports (default schema
    /// when no tenant is bound).
    async fn current_connection(&self) -> Result<(TenantIdentifier, Self::Connection)> {
        let tenant = self.resolver().resolve_current();
        let connection = self.get_connection(&tenant).await?;
        Ok((tenant, connection))
    }
}

/// A pooled connection plus the schema it is bound to, if any.
pub struct TenantConnection {
    schema: Option<TenantIdentifier>,
    inner: PoolConnection<Postgres>,
}

impl TenantConnection {
    pub fn schema(&self) -> Option<&TenantIdentifier> {
        self.schema.as_ref()
    }

    /// Close the underlying session instead of returning it to the pool.
    pub(crate) async fn discard(self) {
        if let Err(e) = self.inner.close().await {
            tracing::warn!("Failed to close discarded connection: {}", e);
        }
    }
}

impl std::fmt::Debug for TenantConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantConnection")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl Deref for TenantConnection {
    type Target = PgConnection;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for TenantConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

/// PostgreSQL implementation backed by a single shared pool.
#[derive(Clone)]
pub struct TenantConnectionProvider {
    pool: PgPool,
    resolver: Arc<TenantIdentifierResolver>,
}

impl TenantConnectionProvider {
    pub fn new(pool: PgPool, resolver: TenantIdentifierResolver) -> Self {
        Self {
            pool,
            resolver: Arc::new(resolver),
        }
    }

    async fn acquire(&self) -> Result<PoolConnection<Postgres>> {
        self.pool.acquire().await.map_err(DatabaseError::acquisition)
    }
}

#[async_trait]
impl MultiTenantConnectionProvider for TenantConnectionProvider {
    type Connection = TenantConnection;

    fn resolver(&self) -> &dyn CurrentTenantResolver {
        self.resolver.as_ref()
    }

    async fn get_any_connection(&self) -> Result<TenantConnection> {
        let mut inner = self.acquire().await?;
        // Drop whatever search_path a previous borrower left behind.
        sqlx::query("RESET search_path")
            .execute(&mut *inner)
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        Ok(TenantConnection {
            schema: None,
            inner,
        })
    }

    async fn release_any_connection(&self, connection: TenantConnection) -> Result<()> {
        drop(connection);
        Ok(())
    }

    async fn get_connection(&self, tenant: &TenantIdentifier) -> Result<TenantConnection> {
        tracing::debug!(
            "Getting connection for a tenant (tenant_identifier={})",
            tenant
        );

        let mut inner = self.acquire().await?;
        switch_schema(&mut inner, tenant).await?;

        Ok(TenantConnection {
            schema: Some(tenant.clone()),
            inner,
        })
    }

    async fn release_connection(
        &self,
        tenant: &TenantIdentifier,
        connection: TenantConnection,
    ) -> Result<()> {
        tracing::debug!(
            "Releasing connection for a tenant (tenant_identifier={})",
            tenant
        );

        if connection.schema() != Some(tenant) {
            tracing::warn!(
                "Connection released under a different tenant (bound={:?}, released_as={})",
                connection.schema().map(|s| s.as_str()),
                tenant
            );
        }

        drop(connection);
        Ok(())
    }
}

/// Point `conn` at `schema` and confirm the server accepted it.
///
/// `SET search_path` silently accepts schemas that do not exist, so the
/// effective `current_schema()` is read back and compared.
pub async fn switch_schema(conn: &mut PgConnection, schema: &TenantIdentifier) -> Result<()> {
    sqlx::query("SELECT set_config('search_path', $1, false)")
        .bind(schema.quoted())
        .execute(&mut *conn)
        .await
        .map_err(|e| DatabaseError::switch_failure(schema.as_str(), e))?;

    let current: Option<String> = sqlx::query_scalar("SELECT current_schema()")
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| DatabaseError::switch_failure(schema.as_str(), e))?;

    verify_active_schema(schema, current.as_deref())
}

fn verify_active_schema(expected: &TenantIdentifier, current: Option<&str>) -> Result<()> {
    match current {
        Some(active) if active == expected.as_str() => Ok(()),
        Some(active) => Err(DatabaseError::schema_switch(
            expected.as_str(),
            format!("active schema is '{}'", active),
        )),
        None => Err(DatabaseError::schema_switch(
            expected.as_str(),
            "schema does not exist",
        )),
    }
}
