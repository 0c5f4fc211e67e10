use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};

/// Error body returned to HTTP callers.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g. "Not Found", "Conflict")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

/// Failure taxonomy for the inventory engine and its HTTP surface.
///
/// Callers receive a typed failure identifying which precondition broke, so
/// the transport layer can map it to a status code without string matching.
#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Warehouse not found: {0}")]
    WarehouseNotFound(i64),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Invalid movement type: {0}")]
    InvalidMovementType(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ProductNotFound(_) | Self::WarehouseNotFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientStock(_) => StatusCode::CONFLICT,
            Self::InvalidMovementType(_) | Self::InvalidQuantity(_) | Self::ValidationError(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::DatabaseError(_) | Self::EventError(_) | Self::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message suitable for HTTP responses. Internal failures return a generic
    /// message so implementation details never leak to callers.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) | Self::EventError(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}
