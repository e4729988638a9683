//! tasklist HTTP/WebSocket gateway.
//!
//! Exposes accounts, lists and items over a JSON API and streams change
//! events over WebSockets. Every data route acts on behalf of the user
//! named by the request's bearer token.

pub mod auth;
pub mod config;
pub mod error;
pub mod json;
pub mod routes;

pub use auth::AuthUser;
pub use config::{Args, GatewayConfig};
pub use error::AppError;

use std::sync::Arc;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use tasklist_client::{RealtimeManager, TodoClient};
use tasklist_core::{FixedSession, LocalPlatform, Session, SharedPlatform};

/// Application state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// The embedded platform.
    pub platform: SharedPlatform,
    /// Change-feed multiplexer shared by all WebSocket connections.
    pub realtime: RealtimeManager,
    /// Gateway configuration.
    pub config: GatewayConfig,
}

impl AppState {
    /// Create new application state.
    pub fn new(platform: LocalPlatform, config: GatewayConfig) -> Self {
        let platform = Arc::new(platform);
        Self {
            realtime: RealtimeManager::new(platform.clone()),
            platform,
            config,
        }
    }

    /// Data client acting as the session's user.
    pub fn client_for(&self, session: Session) -> TodoClient {
        TodoClient::new(
            self.platform.clone(),
            Arc::new(FixedSession::new(session)),
        )
    }
}

/// Create the router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::health::routes())
        .merge(routes::auth::routes())
        .merge(routes::lists::routes())
        .merge(routes::items::routes())
        .merge(routes::changes::routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
