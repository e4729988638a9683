//! Session accessors.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use tasklist_proto::UserId;

use crate::auth::{Authenticator, User};
use crate::error::{AuthError, AuthResult};

/// An authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    pub email: String,
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

/// The session accessor contract.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// The current session, or `None` when nobody is signed in.
    async fn current_session(&self) -> AuthResult<Option<Session>>;
}

#[async_trait]
impl<S: SessionProvider + ?Sized> SessionProvider for Arc<S> {
    async fn current_session(&self) -> AuthResult<Option<Session>> {
        (**self).current_session().await
    }
}

/// A session provider that always returns the same session.
///
/// Used where the caller already authenticated the request, such as a
/// bearer token checked by the HTTP gateway.
#[derive(Debug, Clone, Default)]
pub struct FixedSession(Option<Session>);

impl FixedSession {
    pub fn new(session: Session) -> Self {
        Self(Some(session))
    }

    /// A provider with nobody signed in.
    pub fn anonymous() -> Self {
        Self(None)
    }
}

#[async_trait]
impl SessionProvider for FixedSession {
    async fn current_session(&self) -> AuthResult<Option<Session>> {
        Ok(self.0.clone())
    }
}

/// Client-side session holding the current access token.
///
/// The token is re-validated on every access, so an expired or revoked
/// token reads as signed out.
pub struct TokenSession {
    auth: Arc<Authenticator>,
    token: RwLock<Option<String>>,
}

impl TokenSession {
    pub fn new(auth: Arc<Authenticator>) -> Self {
        Self {
            auth,
            token: RwLock::new(None),
        }
    }

    /// Register an account and keep its session.
    pub fn sign_up(&self, email: &str, password: &str) -> AuthResult<Session> {
        let session = self.auth.sign_up(email, password)?;
        *self.token.write() = Some(session.access_token.clone());
        Ok(session)
    }

    /// Sign in and keep the session.
    pub fn sign_in_with_password(&self, email: &str, password: &str) -> AuthResult<Session> {
        let session = self.auth.sign_in_with_password(email, password)?;
        *self.token.write() = Some(session.access_token.clone());
        Ok(session)
    }

    /// Sign in with a password recovery code and keep the session.
    pub fn exchange_recovery_code(&self, code: &str) -> AuthResult<Session> {
        let session = self.auth.exchange_recovery_code(code)?;
        *self.token.write() = Some(session.access_token.clone());
        Ok(session)
    }

    /// Adopt an access token obtained elsewhere.
    pub fn set_access_token(&self, token: impl Into<String>) {
        *self.token.write() = Some(token.into());
    }

    /// Forget the current token.
    pub fn sign_out(&self) {
        *self.token.write() = None;
    }

    /// Change the password of the signed-in user.
    pub async fn update_password(&self, new_password: &str) -> AuthResult<()> {
        let session = self
            .current_session()
            .await?
            .ok_or_else(|| AuthError::UnknownUser("no active session".to_string()))?;
        self.auth.update_password(session.user_id, new_password)
    }

    /// The signed-in user's account.
    pub async fn user(&self) -> AuthResult<Option<User>> {
        match self.current_session().await? {
            Some(session) => self.auth.user(session.user_id),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl SessionProvider for TokenSession {
    async fn current_session(&self) -> AuthResult<Option<Session>> {
        let stored = self.token.read().clone();
        let Some(token) = stored else {
            return Ok(None);
        };

        match self.auth.verify(&token) {
            Ok(session) => Ok(Some(session)),
            Err(AuthError::Token(err)) => {
                tracing::debug!(error = %err, "stored token rejected");
                Ok(None)
            }
            Err(AuthError::UnknownUser(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }
}
