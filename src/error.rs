// ABOUTME: Centralized error handling system with detailed context and logging
// ABOUTME: Maps internal failures to the {success: false, error} JSON envelope

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Database(sqlx::Error),
    /// Provider rejected the code exchange or omitted the access token.
    AuthExchange(String),
    /// No session, or the session no longer resolves to a user.
    Unauthorized(String),
    /// Caller is blocked by an admin restriction.
    Restricted(String),
    /// Admin-only operation attempted without the admin capability.
    Forbidden(String),
    /// Missing record, or a record the caller does not own. Deliberately
    /// does not distinguish the two cases.
    NotFound(String),
    /// Second review from the same reviewer for the same portfolio.
    DuplicateReview,
    Validation(String),
    Serialization(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Database(err) => write!(f, "Database error: {}", err),
            AppError::AuthExchange(msg) => write!(f, "Auth exchange failed: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Restricted(msg) => write!(f, "Restricted: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::DuplicateReview => write!(f, "Duplicate review"),
            AppError::Validation(msg) => write!(f, "Validation error: {}", msg),
            AppError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::Database(_) => {
                tracing::error!("Database error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database operation failed".to_string(),
                )
            }
            AppError::AuthExchange(msg) => {
                tracing::warn!("Auth exchange failed: {}", msg);
                (
                    StatusCode::UNAUTHORIZED,
                    "Authentication failed".to_string(),
                )
            }
            AppError::Unauthorized(msg) => {
                tracing::warn!("Unauthorized access: {}", msg);
                (
                    StatusCode::UNAUTHORIZED,
                    "Authentication required".to_string(),
                )
            }
            AppError::Restricted(msg) => {
                tracing::info!("Restricted caller: {}", msg);
                (StatusCode::FORBIDDEN, msg.clone())
            }
            AppError::Forbidden(msg) => {
                tracing::warn!("Admin gate refused: {}", msg);
                (StatusCode::FORBIDDEN, msg.clone())
            }
            AppError::NotFound(msg) => {
                tracing::info!("Resource not found: {}", msg);
                (StatusCode::NOT_FOUND, msg.clone())
            }
            AppError::DuplicateReview => (
                StatusCode::CONFLICT,
                "You have already reviewed this portfolio".to_string(),
            ),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Serialization(_) => {
                tracing::error!("Serialization error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Data processing failed".to_string(),
                )
            }
            AppError::Internal(_) => {
                tracing::error!("Internal error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "success": false,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

// Conversion implementations
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::AuthExchange(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
