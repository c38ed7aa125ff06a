use crate::handlers;
use crate::middleware;
use crate::AppState;
use axum::{middleware::from_fn_with_state, routing::get, Router};
use std::sync::Arc;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Everything touching tenant data goes through the tenant middleware
    let tenant_routes = Router::new()
        .route(
            "/products",
            get(handlers::products::list_products).post(handlers::products::create_product),
        )
        .route("/products/:id", get(handlers::products::get_product))
        .layer(from_fn_with_state(state.clone(), middleware::resolve_tenant));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .merge(tenant_routes)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use catalog_database::{Database, DatabaseConfig, ProductRepository, TenantConnectionProvider};
    use catalog_tenant::{TenancyConfig, TenantIdentifierResolver};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    // Lazily connecting pool: requests rejected before reaching the
    // repository never open a connection.
    fn test_state() -> Arc<AppState> {
        let tenancy = TenancyConfig::from_parts("company_x,company_y", "public", "X-Tenant-Id").unwrap();
        let database = Database::connect_lazy(DatabaseConfig {
            url: "postgresql://nobody@127.0.0.1:1/nothing".to_string(),
            min_connections: 0,
            ..Default::default()
        })
        .unwrap();
        let provider = TenantConnectionProvider::new(
            database.pool().clone(),
            TenantIdentifierResolver::new(tenancy.default_schema.clone()),
        );

        Arc::new(AppState {
            products: ProductRepository::new(provider),
            registry: tenancy.registry,
            tenant_header: tenancy.tenant_header,
        })
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_needs_no_tenant() {
        let app = create_router(test_state());
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["tenants"], 2);
    }

    #[tokio::test]
    async fn test_unknown_tenant_is_rejected() {
        let app = create_router(test_state());
        let response = app
            .oneshot(
                Request::get("/products")
                    .header("X-Tenant-Id", "unknown")
                    .header(header::ACCEPT, "application/json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["title"], "Unknown database tenant");
        assert_eq!(
            body["detail"],
            "Value of header X-Tenant-Id does not match a known database tenant"
        );
        assert_eq!(body["tenantId"], "unknown");
    }

    #[tokio::test]
    async fn test_tenant_match_is_case_sensitive() {
        let app = create_router(test_state());
        let response = app
            .oneshot(
                Request::get("/products/1")
                    .header("X-Tenant-Id", "COMPANY_X")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["tenantId"], "COMPANY_X");
    }

    #[tokio::test]
    async fn test_missing_tenant_header_is_rejected() {
        let app = create_router(test_state());
        let response = app
            .oneshot(Request::get("/products").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["tenantId"], "");
    }

    #[tokio::test]
    async fn test_invalid_product_names_are_rejected() {
        for body in [r#"{"name":null}"#, r#"{"name":"  "}"#, r#"{"name":"MoreThan15chars!"}"#] {
            let app = create_router(test_state());
            let response = app
                .oneshot(
                    Request::post("/products")
                        .header("X-Tenant-Id", "company_x")
                        .header(header::CONTENT_TYPE, "application/json")
                        .body(Body::from(body))
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {}", body);
            assert_eq!(body_json(response).await["error"], "validation_error");
        }
    }
}
