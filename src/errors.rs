use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Unprocessable Entity",
    "message": "Insufficient stock: requested 8 level1, available 7 (short 1)",
    "details": {"dimension": "level1", "requested": 8, "available": 7, "shortfall": 1},
    "timestamp": "2025-06-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Structured error payload where one exists (e.g. shortfall breakdown)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

/// The quantity dimension a stock check failed on, with the numbers the
/// caller needs to re-plan: what was asked for, what was actually free, and
/// the gap between the two.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StockShortfall {
    /// Which dimension fell short: "level1", "level2", "level3", or "base".
    pub dimension: String,
    pub requested: i64,
    pub available: i64,
    pub shortfall: i64,
}

impl StockShortfall {
    pub fn new(dimension: &str, requested: i64, available: i64) -> Self {
        Self {
            dimension: dimension.to_string(),
            requested,
            available,
            shortfall: requested - available,
        }
    }
}

impl std::fmt::Display for StockShortfall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "requested {} {}, available {} (short {})",
            self.requested, self.dimension, self.available, self.shortfall
        )
    }
}

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        sea_orm::error::DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(StockShortfall),

    #[error("Reservation is already {0}")]
    AlreadyTerminal(String),

    #[error("Inventory mismatch: {0}")]
    InventoryMismatch(String),

    #[error("Concurrency conflict on record {0}")]
    ConcurrencyConflict(Uuid),

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
    pub fn db_error(error: DbErr) -> Self {
        ServiceError::DatabaseError(error)
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseError(_) | Self::EventError(_) | Self::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::InsufficientStock(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::AlreadyTerminal(_) | Self::InventoryMismatch(_) | Self::ConcurrencyConflict(_) => {
                StatusCode::CONFLICT
            }
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::EventError(_) | Self::InternalError(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    /// Structured payload for errors that carry one.
    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::InsufficientStock(shortfall) => serde_json::to_value(shortfall).ok(),
            _ => None,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            details: self.details(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_error_status_code_mapping() {
        assert_eq!(
            ServiceError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::ValidationError("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::InsufficientStock(StockShortfall::new("level1", 8, 7)).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ServiceError::AlreadyTerminal("cancelled".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::InventoryMismatch("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::ConcurrencyConflict(Uuid::nil()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::InternalError("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn shortfall_arithmetic_and_display() {
        let s = StockShortfall::new("level1", 8, 7);
        assert_eq!(s.shortfall, 1);
        assert_eq!(s.to_string(), "requested 8 level1, available 7 (short 1)");
    }

    #[test]
    fn response_message_hides_internal_details() {
        assert_eq!(
            ServiceError::InternalError("connection pool exhausted".into()).response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::NotFound("record 42".into()).response_message(),
            "Not found: record 42"
        );
    }

    #[test]
    fn insufficient_stock_carries_structured_details() {
        let err = ServiceError::InsufficientStock(StockShortfall::new("base", 20, 12));
        let details = err.details().expect("details expected");
        assert_eq!(details["requested"], 20);
        assert_eq!(details["shortfall"], 8);
    }
}
