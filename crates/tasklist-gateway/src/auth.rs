//! Bearer token authentication.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use tasklist_core::Session;

use crate::error::AppError;
use crate::AppState;

/// The session of an authenticated request.
///
/// The token is read from `Authorization: Bearer <token>`, or from the
/// `access_token` query parameter for WebSocket upgrades.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Session);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let token = bearer_token(parts)
            .or_else(|| query_token(parts))
            .ok_or_else(|| AppError::Unauthenticated("missing bearer token".to_string()))?;

        let session = state.platform.auth().verify(&token).map_err(|err| {
            tracing::debug!(error = %err, "rejected token");
            AppError::from(err)
        })?;
        Ok(AuthUser(session))
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() {
        Some(token.trim().to_string())
    } else {
        None
    }
}

fn query_token(parts: &Parts) -> Option<String> {
    parts.uri.query()?.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == "access_token" && !value.is_empty()).then(|| value.to_string())
    })
}
