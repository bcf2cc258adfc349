//! Domain error types for the Review Insights server.
//!
//! Uses thiserror for ergonomic error handling with automatic Display implementations.

use actix_web::{HttpResponse, ResponseError};
use std::fmt;

/// Application-level errors.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Uploaded file could not be decoded with any supported encoding
    #[error("Decode error: {0}")]
    Decode(String),

    /// Uploaded file has an unparseable tabular structure
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Uploaded file contained zero usable rows
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// Row or size cap exceeded
    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),

    /// Transport or non-2xx failure from the model collaborator
    #[error("Model call failed: {0}")]
    ModelCall(String),

    /// Model response could not be parsed into the expected shape
    #[error("Model output invalid: {0}")]
    ModelOutput(String),

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Resource not found
    #[error("{0} not found")]
    NotFound(String),

    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status, error_code, response_message) = match self {
            AppError::Decode(_) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "DECODE_ERROR",
                self.to_string(),
            ),
            AppError::MalformedInput(_) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "MALFORMED_INPUT",
                self.to_string(),
            ),
            AppError::EmptyInput(_) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "EMPTY_INPUT",
                self.to_string(),
            ),
            AppError::LimitExceeded(_) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "LIMIT_EXCEEDED",
                self.to_string(),
            ),
            AppError::ModelCall(err_str) => {
                tracing::error!("Model call error: {}", err_str);
                (
                    actix_web::http::StatusCode::BAD_GATEWAY,
                    "MODEL_CALL_ERROR",
                    "The language model collaborator failed".to_string(),
                )
            }
            AppError::ModelOutput(err_str) => {
                tracing::error!("Model output error: {}", err_str);
                (
                    actix_web::http::StatusCode::BAD_GATEWAY,
                    "MODEL_OUTPUT_ERROR",
                    "The language model returned an unusable response".to_string(),
                )
            }
            AppError::Database(err_str) => {
                tracing::error!("Database error: {}", err_str);
                (
                    actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "An internal database error occurred".to_string(),
                )
            }
            AppError::NotFound(_) => (
                actix_web::http::StatusCode::NOT_FOUND,
                "NOT_FOUND",
                self.to_string(),
            ),
            AppError::InvalidInput(_) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "INVALID_INPUT",
                self.to_string(),
            ),
        };

        HttpResponse::build(status).json(ErrorResponse {
            error: error_code.to_string(),
            message: response_message,
        })
    }
}

/// Error response body matching the OpenAPI schema.
#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

// Conversion implementations for common error types

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidInput(format!("Invalid UUID: {}", err))
    }
}
