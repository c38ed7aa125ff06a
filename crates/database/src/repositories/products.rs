use crate::error::{DatabaseError, Result};
use crate::provider::{MultiTenantConnectionProvider, TenantConnectionProvider};
use catalog_models::Product;

/// Product storage. Queries use unqualified table names and rely on the
/// connection's `search_path`, so every call lands in the schema of the
/// tenant bound to the current unit of work.
#[derive(Clone)]
pub struct ProductRepository {
    provider: TenantConnectionProvider,
}

impl ProductRepository {
    pub fn new(provider: TenantConnectionProvider) -> Self {
        Self { provider }
    }

    pub async fn create(&self, name: &str) -> Result<Product> {
        let (tenant, mut conn) = self.provider.current_connection().await?;

        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO product (name)
            VALUES ($1)
            RETURNING id, name, created_at
            "#,
        )
        .bind(name)
        .fetch_one(&mut *conn)
        .await;

        self.provider.release_connection(&tenant, conn).await?;
        let product = product?;

        tracing::info!("Created product {} (tenant={})", product.id, tenant);
        Ok(product)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Product> {
        let (tenant, mut conn) = self.provider.current_connection().await?;

        let product = sqlx::query_as::<_, Product>(
            "SELECT id, name, created_at FROM product WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await;

        self.provider.release_connection(&tenant, conn).await?;
        product?.ok_or_else(|| DatabaseError::not_found("Product", &id.to_string()))
    }

    pub async fn list(&self) -> Result<Vec<Product>> {
        let (tenant, mut conn) = self.provider.current_connection().await?;

        let products = sqlx::query_as::<_, Product>(
            "SELECT id, name, created_at FROM product ORDER BY id",
        )
        .fetch_all(&mut *conn)
        .await;

        self.provider.release_connection(&tenant, conn).await?;
        Ok(products?)
    }
}
