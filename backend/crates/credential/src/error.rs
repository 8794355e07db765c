//! Credential Error Types
//!
//! Credential-specific error variants that integrate with the unified
//! `kernel::error::AppError` system.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

/// Credential result type alias
pub type AuthResult<T> = Result<T, AuthError>;

/// Credential error variants
///
/// Stores produce `Conflict`, `Database`, `Storage`; the cache produces
/// `Cache`; services add `InvalidCredentials`, `InvalidToken` and
/// `UserNotFound`. Nothing is re-wrapped on the way up.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed input rejected at the boundary
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Unknown login or wrong password (deliberately indistinguishable)
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Token failed verification, was already rotated/revoked, or its
    /// stored session does not match
    #[error("Invalid token")]
    InvalidToken,

    /// Username or email already taken
    #[error("Conflict on {0}")]
    Conflict(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// Non-sqlx storage failure (unreachable backend, finished unit of work)
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Both flavours of "who are you?" failure
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, AuthError::InvalidCredentials | AuthError::InvalidToken)
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::Conflict(_)
            | AuthError::Database(_)
            | AuthError::Storage(_)
            | AuthError::Cache(_)
            | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::InvalidCredentials | AuthError::InvalidToken => ErrorKind::Unauthorized,
            AuthError::Validation(_) => ErrorKind::BadRequest,
            AuthError::UserNotFound => ErrorKind::NotFound,
            AuthError::Conflict(_)
            | AuthError::Database(_)
            | AuthError::Storage(_)
            | AuthError::Cache(_)
            | AuthError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Client-facing rendering
    ///
    /// Server errors (a registration conflict included) render the generic
    /// message and carry `self` as the source, so details reach the logs only.
    pub fn into_app_error(self) -> AppError {
        let app = match &self {
            AuthError::Validation(msg) => AppError::bad_request(msg.clone()),
            AuthError::InvalidCredentials => AppError::unauthorized("Invalid credentials"),
            AuthError::InvalidToken => AppError::unauthorized("Invalid token"),
            AuthError::UserNotFound => AppError::not_found("User not found"),
            _ => AppError::new(self.kind(), "Internal server error"),
        };
        if app.is_server_error() {
            app.with_source(self)
        } else {
            app
        }
    }

    fn log(&self) {
        match self {
            AuthError::Database(e) => {
                tracing::error!(error = %e, "Credential database error");
            }
            AuthError::Storage(msg) | AuthError::Cache(msg) | AuthError::Internal(msg) => {
                tracing::error!(message = %msg, "Credential internal error");
            }
            AuthError::InvalidCredentials => {
                tracing::warn!("Invalid login attempt");
            }
            AuthError::InvalidToken => {
                tracing::warn!("Rejected token");
            }
            AuthError::Conflict(constraint) => {
                tracing::warn!(constraint = %constraint, "Registration conflict");
            }
            _ => {
                tracing::debug!(error = %self, "Credential error");
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();
        self.into_app_error().into_response()
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                let constraint = db_err.constraint().unwrap_or("unique key").to_string();
                return AuthError::Conflict(constraint);
            }
        }
        AuthError::Database(err)
    }
}

impl From<JsonRejection> for AuthError {
    fn from(rejection: JsonRejection) -> Self {
        AuthError::Validation(format!("invalid body: {}", rejection.body_text()))
    }
}

impl From<platform::password::PasswordHashError> for AuthError {
    fn from(err: platform::password::PasswordHashError) -> Self {
        AuthError::Internal(err.to_string())
    }
}
