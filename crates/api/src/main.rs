// Catalog API Server
// Schema-per-tenant product service: every tenant schema is migrated at
// startup, then requests are routed to their tenant's schema.

mod config;
mod handlers;
mod middleware;
mod routes;

use anyhow::Context;
use catalog_database::{
    Database, MigrationRunner, MigrationSource, PgMigrationStore, ProductRepository,
    TenantConnectionProvider,
};
use catalog_tenant::{TenantIdentifierResolver, TenantRegistry};
use config::Config;
use dotenvy::dotenv;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub struct AppState {
    pub products: ProductRepository,
    pub registry: TenantRegistry,
    pub tenant_header: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| {
            "info,catalog_api=debug,catalog_database=debug,tower_http=debug".to_string()
        }))
        .init();

    tracing::info!("Starting Catalog API Server");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    let tenants: Vec<&str> = config.tenancy.registry.iter().map(|t| t.as_str()).collect();
    tracing::info!(
        "Tenants: [{}] (default schema: {})",
        tenants.join(", "),
        config.tenancy.default_schema
    );

    // Initialize database
    tracing::info!("Connecting to database...");
    let database = Database::new(config.database.clone())
        .await
        .context("Failed to connect to database")?;
    database.ping().await.context("Database ping failed")?;
    tracing::info!("Database connected");

    let provider = TenantConnectionProvider::new(
        database.pool().clone(),
        TenantIdentifierResolver::new(config.tenancy.default_schema.clone()),
    );

    // Migrate every tenant schema before accepting traffic
    let source = MigrationSource::from_dir(&config.migrations_location)
        .context("Failed to load migrations")?;
    let store = PgMigrationStore::new(provider.clone()).with_history_table(&config.history_table)?;
    let report = MigrationRunner::new(store, source)
        .run(&config.tenancy.registry)
        .await;
    for result in report.succeeded() {
        tracing::info!(
            "Tenant schema ready (schema={}, applied={}, version={})",
            result.schema,
            result.migrations_applied,
            result.version.as_ref().map(|v| v.as_str()).unwrap_or("<none>")
        );
    }
    for result in report.failed() {
        tracing::error!(
            "Tenant schema not migrated (schema={}): {}",
            result.schema,
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    report
        .into_result()
        .context("Refusing to start with unmigrated tenant schemas")?;

    let state = Arc::new(AppState {
        products: ProductRepository::new(provider),
        registry: config.tenancy.registry.clone(),
        tenant_header: config.tenancy.tenant_header.clone(),
    });

    // Create router
    let app = routes::create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("Routes configured:");
    tracing::info!("   GET  /health");
    tracing::info!("   GET  /products          ({})", config.tenancy.tenant_header);
    tracing::info!("   POST /products          ({})", config.tenancy.tenant_header);
    tracing::info!("   GET  /products/:id      ({})", config.tenancy.tenant_header);

    // Start server
    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Server ready at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    database.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}
