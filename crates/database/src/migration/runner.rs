use super::source::{MigrationSource, MigrationVersion};
use super::store::{MigrationRecord, MigrationSession, MigrationStore};
use crate::error::{DatabaseError, Result};
use catalog_tenant::{TenantContext, TenantIdentifier, TenantRegistry};
use std::sync::Arc;

/// Lifecycle of one tenant schema during a migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    Pending,
    Migrating,
    Migrated,
    Failed,
}

impl MigrationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Migrated | Self::Failed)
    }
}

/// Outcome of migrating one schema.
#[derive(Debug, Clone)]
pub struct MigrationResult {
    pub schema: TenantIdentifier,
    pub state: MigrationState,
    pub success: bool,
    pub migrations_applied: usize,
    /// Highest recorded version after the run.
    pub version: Option<MigrationVersion>,
    pub error: Option<String>,
}

/// Per-schema results of one run, in registry order.
#[derive(Debug, Clone, Default)]
pub struct MigrationReport {
    results: Vec<MigrationResult>,
}

impl MigrationReport {
    pub fn results(&self) -> &[MigrationResult] {
        &self.results
    }

    pub fn get(&self, schema: &str) -> Option<&MigrationResult> {
        self.results.iter().find(|r| r.schema.as_str() == schema)
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &MigrationResult> {
        self.results.iter().filter(|r| r.success)
    }

    pub fn failed(&self) -> impl Iterator<Item = &MigrationResult> {
        self.results.iter().filter(|r| !r.success)
    }

    pub fn total_applied(&self) -> usize {
        self.results.iter().map(|r| r.migrations_applied).sum()
    }

    pub fn all_migrated(&self) -> bool {
        self.results.iter().all(|r| r.state == MigrationState::Migrated)
    }

    /// Escalate any per-schema failure into one startup-fatal error.
    pub fn into_result(self) -> Result<Self> {
        let schemas: Vec<String> = self.failed().map(|r| r.schema.to_string()).collect();
        if schemas.is_empty() {
            Ok(self)
        } else {
            Err(DatabaseError::MigrationsFailed { schemas })
        }
    }
}

/// Brings every registered tenant schema up to the latest migration version.
///
/// Schemas are processed one after another in registry order. A failure in one
/// schema is recorded and the run moves on to the next tenant; callers decide
/// what to do with failures via [`MigrationReport::into_result`].
pub struct MigrationRunner<S: MigrationStore> {
    store: S,
    source: Arc<MigrationSource>,
}

impl<S: MigrationStore> MigrationRunner<S> {
    pub fn new(store: S, source: MigrationSource) -> Self {
        Self {
            store,
            source: Arc::new(source),
        }
    }

    pub async fn run(&self, registry: &TenantRegistry) -> MigrationReport {
        tracing::info!(
            "Migrating {} tenant schema(s) from {} ({} migration(s) available, latest={})",
            registry.len(),
            self.source.location(),
            self.source.len(),
            self.source.latest_version().map(|v| v.as_str()).unwrap_or("<none>")
        );

        let mut report = MigrationReport::default();
        for schema in registry {
            report.results.push(self.migrate_schema(schema).await);
        }

        let failed = report.failed().count();
        if failed == 0 {
            tracing::info!(
                "All tenant schemas migrated (schemas={}, applied={})",
                report.results.len(),
                report.total_applied()
            );
        } else {
            tracing::error!(
                "Tenant schema migration finished with failures (failed={}, schemas={})",
                failed,
                report.results.len()
            );
        }

        report
    }

    /// Migrate a single schema as its own unit of work.
    pub async fn migrate_schema(&self, schema: &TenantIdentifier) -> MigrationResult {
        let mut result = MigrationResult {
            schema: schema.clone(),
            state: MigrationState::Pending,
            success: false,
            migrations_applied: 0,
            version: None,
            error: None,
        };

        tracing::info!("Migrating tenant schema (schema={})", schema);
        result.state = MigrationState::Migrating;

        let outcome = TenantContext::scope(Some(schema.clone()), self.apply_pending(schema, &mut result)).await;

        match outcome {
            Ok(()) => {
                result.state = MigrationState::Migrated;
                result.success = true;
                tracing::info!(
                    "Tenant schema migrated successfully (schema={}, success={}, applied={}, version={})",
                    schema,
                    result.success,
                    result.migrations_applied,
                    result.version.as_ref().map(|v| v.as_str()).unwrap_or("<none>")
                );
            }
            Err(e) => {
                result.state = MigrationState::Failed;
                result.error = Some(e.to_string());
                tracing::error!(
                    "Tenant schema migration failed (schema={}, applied={}): {}",
                    schema,
                    result.migrations_applied,
                    e
                );
            }
        }

        result
    }

    async fn apply_pending(&self, schema: &TenantIdentifier, result: &mut MigrationResult) -> Result<()> {
        let mut session = self.store.open(schema).await?;
        let outcome = self.apply_in_session(schema, &mut session, result).await;
        let closed = session.close().await;
        outcome.and(closed)
    }

    async fn apply_in_session(
        &self,
        schema: &TenantIdentifier,
        session: &mut S::Session,
        result: &mut MigrationResult,
    ) -> Result<()> {
        let history = session.history().await?;

        self.validate(schema, &history)?;

        let high_water = history.iter().map(|r| r.version.clone()).max();
        result.version = high_water.clone();

        let pending: Vec<_> = self.source.pending_after(high_water.as_ref()).collect();
        if pending.is_empty() {
            tracing::debug!("Schema is up to date (schema={})", schema);
        }

        for migration in pending {
            tracing::info!(
                "Applying migration (schema={}, version={}, description={})",
                schema,
                migration.version,
                migration.description
            );

            if session.apply(migration).await? {
                result.migrations_applied += 1;
            } else {
                tracing::warn!(
                    "Migration already recorded by another process (schema={}, version={})",
                    schema,
                    migration.version
                );
            }
            result.version = Some(migration.version.clone());
        }

        Ok(())
    }

    /// Reject schemas whose history disagrees with the source.
    fn validate(&self, schema: &TenantIdentifier, history: &[MigrationRecord]) -> Result<()> {
        let high_water = history.iter().map(|r| &r.version).max();

        for record in history {
            if !record.success {
                return Err(DatabaseError::MigrationFailed {
                    schema: schema.to_string(),
                    version: record.version.to_string(),
                    reason: "history records a failed migration; repair the schema before migrating".to_string(),
                });
            }

            match self.source.get(&record.version) {
                Some(migration) if migration.checksum != record.checksum => {
                    return Err(DatabaseError::ChecksumMismatch {
                        schema: schema.to_string(),
                        version: record.version.to_string(),
                        recorded: record.checksum.clone(),
                        expected: migration.checksum.clone(),
                    });
                }
                Some(_) => {}
                None => tracing::warn!(
                    "Applied migration not found in source (schema={}, version={})",
                    schema,
                    record.version
                ),
            }
        }

        for migration in self.source.migrations() {
            let recorded = history.iter().any(|r| r.version == migration.version);
            if !recorded && high_water.is_some_and(|hw| migration.version < *hw) {
                tracing::warn!(
                    "Ignoring migration older than the schema version (schema={}, version={})",
                    schema,
                    migration.version
                );
            }
        }

        Ok(())
    }
}
