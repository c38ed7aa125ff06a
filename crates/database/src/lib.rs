pub mod connection;
pub mod error;
pub mod migration;
pub mod provider;
pub mod repositories;

pub use connection::{Database, DatabaseConfig};
pub use error::{DatabaseError, Result};
pub use migration::{
    Migration, MigrationRecord, MigrationReport, MigrationResult, MigrationRunner,
    MigrationSource, MigrationState, MigrationVersion, PgMigrationStore,
};
pub use provider::{MultiTenantConnectionProvider, TenantConnection, TenantConnectionProvider};
pub use repositories::products::ProductRepository;
