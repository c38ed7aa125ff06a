use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::{Validate, ValidationError};

/// Product row. Lives in the tenant's own schema, so `id` is only unique
/// within one tenant.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing)]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewProduct {
    #[validate(required, length(min = 1, max = 15))]
    pub name: Option<String>,
}

impl NewProduct {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }

    /// Full validation: derive rules plus a non-blank check.
    pub fn check(&self) -> Result<&str, validator::ValidationErrors> {
        self.validate()?;

        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => Ok(name),
            _ => {
                let mut errors = validator::ValidationErrors::new();
                errors.add("name", ValidationError::new("blank"));
                Err(errors)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductList {
    pub products: Vec<Product>,
}
