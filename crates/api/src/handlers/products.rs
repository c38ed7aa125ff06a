use crate::handlers::ApiError;
use crate::middleware::CurrentTenant;
use crate::AppState;
use axum::{
    extract::{Extension, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use catalog_models::{NewProduct, Product, ProductList};
use std::sync::Arc;

/// Create a product in the caller's tenant schema
/// POST /products
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    Extension(CurrentTenant(tenant)): Extension<CurrentTenant>,
    Json(request): Json<NewProduct>,
) -> Result<impl IntoResponse, ApiError> {
    let name = request.check()?;
    let product = state.products.create(name).await?;

    tracing::debug!("Product {} created for tenant {}", product.id, tenant);

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, format!("/products/{}", product.id))],
    ))
}

/// List products of the caller's tenant
/// GET /products
pub async fn list_products(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ProductList>, ApiError> {
    let products = state.products.list().await?;
    Ok(Json(ProductList { products }))
}

/// GET /products/:id
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(state.products.get_by_id(id).await?))
}
