//! Account endpoints.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    routing::post,
    Json, Router,
};

use tasklist_core::{Session, User};

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::json::{
    AuthResponse, Credentials, RecoverRequest, RecoveryCallbackQuery, UpdatePasswordRequest,
};
use crate::AppState;

/// Account routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(sign_up))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/update-password", post(update_password))
        .route("/auth/recover", post(recover))
        .route("/auth/callback", get(recovery_callback))
        .route("/auth/user", get(current_user))
}

fn load_user(state: &AppState, session: &Session) -> Result<User, AppError> {
    state
        .platform
        .auth()
        .user(session.user_id)?
        .ok_or_else(|| AppError::Unauthenticated("account no longer exists".to_string()))
}

/// Register an account and sign it in.
async fn sign_up(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let session = state
        .platform
        .auth()
        .sign_up(&credentials.email, &credentials.password)?;
    let user = load_user(&state, &session)?;
    Ok((StatusCode::CREATED, Json(AuthResponse::new(session, user))))
}

/// Sign in with email and password.
async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<AuthResponse>, AppError> {
    let session = state
        .platform
        .auth()
        .sign_in_with_password(&credentials.email, &credentials.password)?;
    let user = load_user(&state, &session)?;
    Ok(Json(AuthResponse::new(session, user)))
}

/// Tokens are stateless; logging out only requires a valid one.
async fn logout(AuthUser(session): AuthUser) -> StatusCode {
    tracing::debug!(user_id = %session.user_id, "user signed out");
    StatusCode::NO_CONTENT
}

async fn update_password(
    AuthUser(session): AuthUser,
    State(state): State<AppState>,
    Json(request): Json<UpdatePasswordRequest>,
) -> Result<StatusCode, AppError> {
    state
        .platform
        .auth()
        .update_password(session.user_id, &request.password)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Start password recovery.
///
/// Answers 202 whether or not the email has an account. There is no mail
/// transport; the recovery link is written to the log.
async fn recover(
    State(state): State<AppState>,
    Json(request): Json<RecoverRequest>,
) -> Result<StatusCode, AppError> {
    if let Some(code) = state.platform.auth().request_password_reset(&request.email)? {
        tracing::info!(
            target: "tasklist_gateway::recovery",
            link = %format!("/auth/callback?code={code}"),
            "recovery link issued"
        );
    }
    Ok(StatusCode::ACCEPTED)
}

/// Exchange a recovery code for a session.
async fn recovery_callback(
    State(state): State<AppState>,
    Query(query): Query<RecoveryCallbackQuery>,
) -> Result<Json<AuthResponse>, AppError> {
    let session = state.platform.auth().exchange_recovery_code(&query.code)?;
    let user = load_user(&state, &session)?;
    Ok(Json(AuthResponse::new(session, user)))
}

async fn current_user(
    AuthUser(session): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<User>, AppError> {
    Ok(Json(load_user(&state, &session)?))
}
