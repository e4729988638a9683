//! Client error types.

use thiserror::Error;

use tasklist_core::{AuthError, FeedError, StoreError};
use tasklist_proto::Table;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No authenticated session is available.
    #[error("not authenticated")]
    Unauthenticated,

    /// The store rejected or failed the request.
    #[error("request failed: {0}")]
    Request(#[source] StoreError),

    /// The row does not exist or belongs to someone else.
    #[error("{table} row {id} not found")]
    NotFound { table: Table, id: String },

    /// The payload failed validation.
    #[error("validation failed: {0}")]
    Validation(#[from] tasklist_proto::Error),

    /// A realtime subscription could not be opened.
    #[error("realtime error: {0}")]
    Realtime(#[from] FeedError),
}

impl ClientError {
    /// Whether the error means the referenced row does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound { .. })
    }

    /// Whether the caller must sign in again.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, ClientError::Unauthenticated)
    }
}

impl From<StoreError> for ClientError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { table, id } => ClientError::NotFound { table, id },
            StoreError::Invalid(err) => ClientError::Validation(err),
            other => ClientError::Request(other),
        }
    }
}

impl From<AuthError> for ClientError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Store(err) => ClientError::Request(err),
            _ => ClientError::Unauthenticated,
        }
    }
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
