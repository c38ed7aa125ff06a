use thiserror::Error;

pub type Result<T> = std::result::Result<T, DatabaseError>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database error: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Connection pool exhausted: {0}")]
    PoolExhausted(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Failed to switch connection to schema '{tenant}': {reason}")]
    SchemaSwitch { tenant: String, reason: String },

    #[error("Invalid migration source: {0}")]
    MigrationSource(String),

    #[error("Migration checksum mismatch in schema '{schema}' for version {version}: recorded {recorded}, source {expected}")]
    ChecksumMismatch {
        schema: String,
        version: String,
        recorded: String,
        expected: String,
    },

    #[error("Migration {version} failed in schema '{schema}': {reason}")]
    MigrationFailed {
        schema: String,
        version: String,
        reason: String,
    },

    #[error("Migrations failed for {} tenant schema(s): {}", schemas.len(), schemas.join(", "))]
    MigrationsFailed { schemas: Vec<String> },

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl DatabaseError {
    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::NotFound(format!("{} with id {} not found", entity, id))
    }

    pub fn schema_switch(tenant: &str, reason: impl ToString) -> Self {
        Self::SchemaSwitch {
            tenant: tenant.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Classify a driver error raised while pinning a connection to a schema.
    /// Only errors reported by the server concern the schema; transport
    /// failures mean the backing store is unreachable.
    pub fn switch_failure(tenant: &str, error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::Database(e) => Self::schema_switch(tenant, e),
            other => Self::ConnectionFailed(other.to_string()),
        }
    }

    /// Classify a failure to obtain a connection from the pool.
    pub fn acquisition(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut => {
                Self::PoolExhausted("timed out waiting for a free connection".to_string())
            }
            sqlx::Error::PoolClosed => Self::PoolExhausted("pool is closed".to_string()),
            other => Self::ConnectionFailed(other.to_string()),
        }
    }

    /// Only pool exhaustion is worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PoolExhausted(_))
    }
}
