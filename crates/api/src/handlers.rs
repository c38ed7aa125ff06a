pub mod error;
pub mod health;
pub mod products;

// Re-export common types
pub use error::{ApiError, ErrorResponse, ProblemDetail};
