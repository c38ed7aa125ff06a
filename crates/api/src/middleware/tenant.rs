use crate::handlers::ProblemDetail;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
    Json,
};
use catalog_tenant::{run_tenant_unit, TenantIdentifier};
use std::sync::Arc;

/// Tenant bound to the request, available to handlers as an extension.
#[derive(Debug, Clone)]
pub struct CurrentTenant(pub TenantIdentifier);

/// Read the tenant header, validate it against the registry and run the rest
/// of the request inside a tenant unit of work.
///
/// Unknown, missing or unreadable tenant headers are rejected here, before
/// any database connection is requested.
pub async fn resolve_tenant(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<ProblemDetail>)> {
    let header = state.tenant_header.as_str();
    let raw = request
        .headers()
        .get(header)
        .map(|value| value.to_str().unwrap_or_default().to_string())
        .unwrap_or_default();

    let tenant = state.registry.resolve(&raw).map_err(|_| {
        tracing::warn!("Rejecting request for unknown tenant (tenant_id={:?})", raw);
        (
            StatusCode::BAD_REQUEST,
            Json(ProblemDetail::unknown_tenant(header, &raw)),
        )
    })?;

    request.extensions_mut().insert(CurrentTenant(tenant.clone()));
    Ok(run_tenant_unit(tenant, next.run(request)).await)
}
