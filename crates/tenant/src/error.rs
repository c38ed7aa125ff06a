use thiserror::Error;

pub type Result<T> = std::result::Result<T, TenantError>;

#[derive(Debug, Error)]
pub enum TenantError {
    #[error("Invalid tenant identifier '{identifier}': {reason}")]
    InvalidIdentifier { identifier: String, reason: String },

    #[error("Schema '{0}' is reserved as the default schema and cannot be registered as a tenant")]
    ReservedSchema(String),

    #[error("Tenant registry is empty: at least one tenant schema must be configured")]
    EmptyRegistry,

    #[error("Unknown tenant: {0}")]
    UnknownTenant(String),

    #[error("No tenant unit of work is active on this task")]
    NoUnitOfWork,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TenantError {
    pub fn invalid(identifier: &str, reason: &str) -> Self {
        Self::InvalidIdentifier {
            identifier: identifier.to_string(),
            reason: reason.to_string(),
        }
    }
}
