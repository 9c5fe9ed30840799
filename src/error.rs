use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(anyhow::Error),
}

/// Unique constraint on `users.email`.
const EMAIL_UNIQUE_CONSTRAINT: &str = "users_email_key";

/// Constraint violations surface as client errors. Every foreign key in the
/// schema points at `users`, so a violation means the caller's row is gone
/// (deleted account with a still-valid token, or a dev `x-user-id`).
impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        let db_err = e
            .downcast_ref::<sqlx::Error>()
            .and_then(|err| err.as_database_error());
        if let Some(db_err) = db_err {
            if db_err.is_foreign_key_violation() {
                tracing::warn!(constraint = ?db_err.constraint(), "row references a missing user");
                return AppError::NotFound("User not found".into());
            }
            if db_err.is_unique_violation() {
                tracing::warn!(constraint = ?db_err.constraint(), "unique violation");
                let message = match db_err.constraint() {
                    Some(EMAIL_UNIQUE_CONSTRAINT) => "Email already registered",
                    _ => "Already exists",
                };
                return AppError::Conflict(message.into());
            }
        }
        AppError::Internal(e)
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorBody { message })).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
