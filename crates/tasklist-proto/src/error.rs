//! Protocol error types.

use thiserror::Error;

/// Validation and parsing errors for model types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A name field was empty after trimming.
    #[error("{field} must not be empty")]
    EmptyName {
        /// The offending field.
        field: &'static str,
    },

    /// An identifier could not be parsed.
    #[error("invalid id: {0}")]
    InvalidId(String),

    /// A status string did not name a known status.
    #[error("unknown status: {0}")]
    UnknownStatus(String),

    /// A topic string did not name a known topic.
    #[error("unknown topic: {0}")]
    UnknownTopic(String),
}
