// Tenant identity and request-scoped tenant routing
// Everything here is database-agnostic; the connection provider in
// catalog-database consumes the resolver to pick a schema.

pub mod config;
pub mod context;
pub mod error;
pub mod identifier;
pub mod registry;
pub mod resolver;

pub use config::TenancyConfig;
pub use context::{run_tenant_unit, TenantContext};
pub use error::{Result, TenantError};
pub use identifier::TenantIdentifier;
pub use registry::TenantRegistry;
pub use resolver::{CurrentTenantResolver, TenantIdentifierResolver};
