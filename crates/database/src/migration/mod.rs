//! Per-tenant schema migrations.
//!
//! One [`MigrationSource`] is shared by every tenant; each tenant schema keeps
//! its own history table, and the [`MigrationRunner`] walks the tenant
//! registry bringing each schema up to the latest version.

pub mod runner;
pub mod source;
pub mod store;

pub use runner::{MigrationReport, MigrationResult, MigrationRunner, MigrationState};
pub use source::{Migration, MigrationSource, MigrationVersion};
pub use store::{
    MigrationRecord, MigrationSession, MigrationStore, PgMigrationStore,
    DEFAULT_HISTORY_TABLE,
};
