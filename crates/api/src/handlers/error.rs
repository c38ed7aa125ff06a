use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use catalog_database::DatabaseError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
        }
    }
}

/// RFC 7807 style body used when a request names a tenant we do not know.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDetail {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub tenant_id: String,
}

impl ProblemDetail {
    pub fn unknown_tenant(header: &str, tenant_id: &str) -> Self {
        Self {
            problem_type: "about:blank".to_string(),
            title: "Unknown database tenant".to_string(),
            status: StatusCode::BAD_REQUEST.as_u16(),
            detail: format!(
                "Value of header {} does not match a known database tenant",
                header
            ),
            tenant_id: tenant_id.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            ApiError::Database(DatabaseError::NotFound(_)) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::Database(DatabaseError::InvalidInput(_)) => {
                (StatusCode::BAD_REQUEST, "invalid_input")
            }
            ApiError::Database(e) if e.is_retryable() => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable")
            }
            ApiError::Database(DatabaseError::SchemaSwitch { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "tenant_schema_unavailable")
            }
            ApiError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let message = match &self {
            ApiError::Database(_) if status == StatusCode::INTERNAL_SERVER_ERROR => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorResponse::new(code, &message))).into_response()
    }
}
