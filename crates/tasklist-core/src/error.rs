//! Platform error types.

use thiserror::Error;

use tasklist_proto::Table;

/// Errors returned by the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Row encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The request payload was rejected.
    #[error("invalid request: {0}")]
    Invalid(#[from] tasklist_proto::Error),

    /// No row with this id is visible to the caller.
    #[error("{table} row {id} not found")]
    NotFound {
        /// Table that was queried.
        table: Table,
        /// Requested id.
        id: String,
    },

    /// The store cannot be reached.
    #[error("store unavailable")]
    Unavailable,
}

impl StoreError {
    pub(crate) fn not_found(table: Table, id: impl ToString) -> Self {
        StoreError::NotFound {
            table,
            id: id.to_string(),
        }
    }

    /// Whether the error means the referenced row does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Email/password pair did not match a user.
    #[error("invalid login credentials")]
    InvalidCredentials,

    /// An account with this email already exists.
    #[error("user already registered: {0}")]
    EmailTaken(String),

    /// The email address is malformed.
    #[error("invalid email: {0}")]
    InvalidEmail(String),

    /// The password does not meet the minimum requirements.
    #[error("password should be at least {min_length} characters")]
    WeakPassword {
        /// Minimum accepted length.
        min_length: usize,
    },

    /// The token could not be issued or verified.
    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    /// The token refers to a user that no longer exists.
    #[error("unknown user: {0}")]
    UnknownUser(String),

    /// The recovery code is unknown, already used or expired.
    #[error("recovery code is invalid or has expired")]
    InvalidRecoveryCode,

    /// A stored account record could not be read back.
    #[error("corrupt account record: {0}")]
    Corrupt(String),

    /// Backing storage failed.
    #[error("auth storage error: {0}")]
    Store(#[from] StoreError),
}

impl From<sled::Error> for AuthError {
    fn from(err: sled::Error) -> Self {
        AuthError::Store(StoreError::Storage(err))
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        AuthError::Store(StoreError::Serialization(err))
    }
}

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Change-feed errors.
#[derive(Debug, Error)]
pub enum FeedError {
    /// A channel with this name is already open.
    #[error("channel already open: {0}")]
    DuplicateChannel(String),

    /// The realtime transport is not reachable.
    #[error("realtime transport unavailable")]
    Unavailable,
}

/// Errors opening or operating the platform as a whole.
#[derive(Debug, Error)]
pub enum Error {
    /// Store error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Authentication error.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Change-feed error.
    #[error(transparent)]
    Feed(#[from] FeedError),
}
