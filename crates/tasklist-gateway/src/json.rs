//! JSON request and response types for the HTTP gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tasklist_core::{Session, User};

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Health status.
    pub status: String,
    /// Gateway version.
    pub version: String,
    /// Open change-feed channels.
    pub open_channels: usize,
    /// Stored lists.
    pub lists: usize,
    /// Stored items.
    pub items: usize,
}

/// Email/password credentials.
#[derive(Debug, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Issued session.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

impl AuthResponse {
    pub fn new(session: Session, user: User) -> Self {
        Self {
            access_token: session.access_token,
            token_type: "bearer".to_string(),
            expires_at: session.expires_at,
            user,
        }
    }
}

/// Password change request.
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdatePasswordRequest {
    pub password: String,
}

/// Password recovery request.
#[derive(Debug, Serialize, Deserialize)]
pub struct RecoverRequest {
    pub email: String,
}

/// Query string of the recovery callback.
#[derive(Debug, Serialize, Deserialize)]
pub struct RecoveryCallbackQuery {
    pub code: String,
}

/// Item creation request; the list comes from the path.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateItemRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Query string of the change stream endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChangesQuery {
    /// `lists`, `items` or `list`.
    pub topic: String,
    /// Required when `topic` is `list`.
    #[serde(default)]
    pub list_id: Option<tasklist_proto::ListId>,
}
