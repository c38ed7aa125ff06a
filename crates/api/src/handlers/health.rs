use crate::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Number of tenant schemas this instance serves.
    pub tenants: usize,
}

/// Liveness probe. Needs no tenant header and never touches the database;
/// every tenant schema was migrated before the listener was bound.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        tenants: state.registry.len(),
    })
}
