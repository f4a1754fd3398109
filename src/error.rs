use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::crypto::CryptoError;

/// Failures surfaced by request handlers.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed input, detected before anything is written.
    #[error("{0}")]
    Validation(String),

    /// Unknown email or wrong password. Deliberately the same for both.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// No usable bearer credentials on a protected request.
    #[error("{0}")]
    Unauthenticated(&'static str),

    /// Malformed, tampered, expired or wrong-kind token.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// Absent, or present but owned by someone else.
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("encryption error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials
            | AppError::Unauthenticated(_)
            | AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Crypto(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::Unauthenticated(_) | AppError::InvalidToken => "unauthorized",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Database(_) => "database_error",
            AppError::Crypto(_) => "encryption_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// Text shown to the client. Server-side failures never leak their cause.
    fn public_message(&self) -> String {
        match self {
            AppError::Database(_) | AppError::Crypto(_) | AppError::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::Database(e) => tracing::error!(error = %e, "database error"),
            AppError::Crypto(e) => tracing::error!(error = %e, "encryption error"),
            AppError::Internal(msg) => tracing::error!(error = %msg, "internal error"),
            AppError::InvalidCredentials
            | AppError::Unauthenticated(_)
            | AppError::InvalidToken => tracing::warn!(error = %self, "rejected credentials"),
            _ => tracing::debug!(error = %self, %status, "request failed"),
        }

        let body = serde_json::json!({
            "error": {
                "type": self.kind(),
                "message": self.public_message(),
            }
        });
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "rejected request body");
        let message = match rejection {
            JsonRejection::MissingJsonContentType(_) => {
                "Expected request with `Content-Type: application/json`"
            }
            JsonRejection::JsonSyntaxError(_) => "Request body is not valid JSON",
            JsonRejection::JsonDataError(_) => "Request body has missing or invalid fields",
            _ => "Invalid request body",
        };
        AppError::Validation(message.into())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "rejected path parameter");
        AppError::Validation("Invalid path parameter".into())
    }
}

/// Maps a unique-constraint violation to `Conflict`, anything else to `Database`.
pub fn conflict_on_unique(e: sqlx::Error, message: &str) -> AppError {
    match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            AppError::Conflict(message.to_string())
        }
        other => AppError::Database(other),
    }
}
