use axum::http::HeaderName;
use catalog_database::DatabaseConfig;
use catalog_tenant::{TenancyConfig, TenantError};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid tenancy configuration: {0}")]
    Tenancy(#[from] TenantError),

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database: DatabaseConfig,
    pub tenancy: TenancyConfig,
    pub migrations_location: String,
    pub history_table: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let server_port = match std::env::var("SERVER_PORT") {
            Ok(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
                name: "SERVER_PORT",
                value,
            })?,
            Err(_) => 8080,
        };

        let tenancy = TenancyConfig::from_env()?;
        check_header_name(&tenancy.tenant_header)?;

        Ok(Self {
            server_host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port,
            database: DatabaseConfig::from_env(),
            tenancy,
            migrations_location: std::env::var("MIGRATIONS_LOCATION")
                .unwrap_or_else(|_| "migrations".to_string()),
            history_table: std::env::var("MIGRATION_HISTORY_TABLE")
                .unwrap_or_else(|_| catalog_database::migration::DEFAULT_HISTORY_TABLE.to_string()),
        })
    }
}

/// The tenant header must be usable as an HTTP header name, otherwise no
/// request could ever carry it.
fn check_header_name(header: &str) -> Result<(), ConfigError> {
    HeaderName::from_str(header)
        .map(|_| ())
        .map_err(|_| ConfigError::InvalidValue {
            name: "TENANT_HEADER",
            value: header.to_string(),
        })
}
