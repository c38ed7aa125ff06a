use crate::error::{Result, TenantError};
use crate::identifier::TenantIdentifier;
use crate::registry::TenantRegistry;

pub const DEFAULT_SCHEMA: &str = "public";
pub const DEFAULT_TENANT_HEADER: &str = "X-Tenant-Id";

/// Tenancy settings read once at startup.
#[derive(Debug, Clone)]
pub struct TenancyConfig {
    pub registry: TenantRegistry,
    pub default_schema: TenantIdentifier,
    pub tenant_header: String,
}

impl TenancyConfig {
    /// Load from environment variables
    ///
    /// - TENANT_SCHEMAS: comma-separated tenant schema names (required)
    /// - DEFAULT_SCHEMA: fallback schema when no tenant is bound (default: public)
    /// - TENANT_HEADER: request header carrying the tenant (default: X-Tenant-Id)
    pub fn from_env() -> Result<Self> {
        let schemas = std::env::var("TENANT_SCHEMAS")
            .map_err(|_| TenantError::Config("TENANT_SCHEMAS must be set".to_string()))?;
        let default_schema =
            std::env::var("DEFAULT_SCHEMA").unwrap_or_else(|_| DEFAULT_SCHEMA.to_string());
        let tenant_header = std::env::var("TENANT_HEADER")
            .unwrap_or_else(|_| DEFAULT_TENANT_HEADER.to_string());

        Self::from_parts(&schemas, &default_schema, &tenant_header)
    }

    pub fn from_parts(schemas: &str, default_schema: &str, tenant_header: &str) -> Result<Self> {
        let default_schema = TenantIdentifier::new(default_schema)?;
        let registry = TenantRegistry::parse(schemas, &default_schema)?;

        if tenant_header.trim().is_empty() {
            return Err(TenantError::Config("TENANT_HEADER must not be blank".to_string()));
        }

        Ok(Self {
            registry,
            default_schema,
            tenant_header: tenant_header.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts() {
        let config = TenancyConfig::from_parts("company_x,company_y", "public", "X-Tenant-Id").unwrap();
        assert_eq!(config.registry.len(), 2);
        assert_eq!(config.default_schema.as_str(), "public");
        assert_eq!(config.tenant_header, "X-Tenant-Id");
    }

    #[test]
    fn test_invalid_default_schema() {
        assert!(TenancyConfig::from_parts("company_x", "not valid", "X-Tenant-Id").is_err());
    }

    #[test]
    fn test_blank_header() {
        assert!(matches!(
            TenancyConfig::from_parts("company_x", "public", "  "),
            Err(TenantError::Config(_))
        ));
    }
}
