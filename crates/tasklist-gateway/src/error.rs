//! Error handling for the gateway.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tasklist_client::ClientError;
use tasklist_core::{AuthError, FeedError, StoreError};

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing, invalid or expired credentials.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    /// Malformed or invalid request.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Row does not exist or belongs to someone else.
    #[error("not found: {0}")]
    NotFound(String),
    /// Resource already exists.
    #[error("conflict: {0}")]
    Conflict(String),
    /// The platform failed the request.
    #[error("request failed: {0}")]
    RequestFailed(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error flag.
    pub error: bool,
    /// Error code.
    pub code: String,
    /// Error message.
    pub message: String,
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            AppError::RequestFailed(_) => (StatusCode::SERVICE_UNAVAILABLE, "REQUEST_FAILED"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();
        let message = match self {
            AppError::Unauthenticated(msg)
            | AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::RequestFailed(msg)
            | AppError::Internal(msg) => msg,
        };

        if status.is_server_error() {
            tracing::warn!(code, message = %message, "request failed");
        }

        let body = ErrorResponse {
            error: true,
            code: code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ClientError> for AppError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Unauthenticated => AppError::Unauthenticated(err.to_string()),
            ClientError::NotFound { .. } => AppError::NotFound(err.to_string()),
            ClientError::Validation(_) => AppError::BadRequest(err.to_string()),
            ClientError::Request(_) | ClientError::Realtime(_) => {
                AppError::RequestFailed(err.to_string())
            }
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::EmailTaken(_) => AppError::Conflict(err.to_string()),
            AuthError::InvalidEmail(_) | AuthError::WeakPassword { .. } => {
                AppError::BadRequest(err.to_string())
            }
            AuthError::InvalidCredentials
            | AuthError::InvalidRecoveryCode
            | AuthError::Token(_)
            | AuthError::UnknownUser(_) => AppError::Unauthenticated(err.to_string()),
            AuthError::Store(_) => AppError::RequestFailed(err.to_string()),
            AuthError::Corrupt(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        ClientError::from(err).into()
    }
}

impl From<FeedError> for AppError {
    fn from(err: FeedError) -> Self {
        AppError::RequestFailed(err.to_string())
    }
}

impl From<tasklist_proto::Error> for AppError {
    fn from(err: tasklist_proto::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON error: {}", err))
    }
}
