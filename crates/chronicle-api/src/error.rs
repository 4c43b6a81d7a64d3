//! Chronicle API: error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chronicle_core::error::DomainError;
use chronicle_core::registry::RegistryError;
use serde::Serialize;
use thiserror::Error;

/// Startup errors for the API server.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database connection or pool error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Two message sources claimed the same type.
    #[error("type registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Startup seeding failed.
    #[error("seeding error: {0}")]
    Seeding(#[source] DomainError),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
}

/// HTTP-layer wrapper around `DomainError` that implements `IntoResponse`.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self.0 {
            DomainError::AggregateNotFound { .. } => {
                (StatusCode::NOT_FOUND, "aggregate_not_found")
            }
            DomainError::AggregateDeleted { .. } => (StatusCode::GONE, "aggregate_deleted"),
            DomainError::VersionMismatch { .. } => (StatusCode::CONFLICT, "version_mismatch"),
            DomainError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            DomainError::UnknownEvent { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "unknown_event")
            }
            DomainError::SeedPrefixMismatch { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "seed_prefix_mismatch")
            }
            DomainError::Codec(_) => (StatusCode::INTERNAL_SERVER_ERROR, "codec_error"),
            DomainError::Cancelled => (StatusCode::INTERNAL_SERVER_ERROR, "cancelled"),
            DomainError::Infrastructure(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "infrastructure_error")
            }
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }

        let body = ErrorBody {
            error: error_code,
            message: self.0.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
