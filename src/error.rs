/**
 * API Error Types
 * Every failure a handler can surface, mapped onto the JSON envelope.
 */
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::auth::request::{auth_error_response, permission_error_response};
use crate::routes::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or missing input.
    #[error("{0}")]
    Validation(String),

    /// Missing, invalid or expired token.
    #[error("{0}")]
    Authentication(String),

    /// Authenticated, but not allowed to touch the target.
    #[error("{0}")]
    Authorization(String),

    #[error("{0}")]
    NotFound(String),

    /// Query or runtime failure. The message carries the underlying error text.
    #[error("Neočekávaná chyba: {0}")]
    Unexpected(String),

    #[error("Databáze není dostupná")]
    ServiceUnavailable,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound("Záznam nebyl nalezen".to_string())
    }

    pub fn forbidden() -> Self {
        Self::Authorization("Nemáte oprávnění k této akci".to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::Authorization(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::not_found(),
            // Client-supplied ids (event, organizer, cover image) that do not exist.
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                tracing::debug!(error = %db, "foreign key violation");
                Self::validation("Odkazovaný záznam neexistuje")
            }
            other => {
                tracing::error!(error = %other, "database error");
                Self::Unexpected(other.to_string())
            }
        }
    }
}

impl From<axum::extract::rejection::JsonRejection> for ApiError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        Self::Validation(format!("Neplatná JSON data: {}", rejection.body_text()))
    }
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        Self::Validation(format!("Neplatná multipart data: {}", err.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            Self::Authentication(message) => auth_error_response(&message, status),
            Self::Authorization(message) => permission_error_response(&message, status),
            other => error_envelope(other.to_string(), status),
        }
    }
}

/// `{ success: false, message }` with the given status.
pub fn error_envelope(message: impl Into<String>, status: StatusCode) -> Response {
    (status, Json(ApiResponse::<()>::failure(message))).into_response()
}
