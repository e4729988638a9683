//! tasklist HTTP/WebSocket gateway binary.

use clap::Parser;
use tasklist_core::LocalPlatform;
use tasklist_gateway::{create_router, AppState, Args, GatewayConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tasklist_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = GatewayConfig::from(&args);

    info!(
        listen = %config.listen_addr,
        data_path = ?config.data_path,
        session_ttl_secs = config.session_ttl.as_secs(),
        "Starting tasklist gateway"
    );
    if config.uses_development_secret() {
        tracing::warn!("no JWT secret configured, using the development secret");
    }

    let platform = LocalPlatform::open(config.platform_config())?;
    let state = AppState::new(platform, config.clone());
    let app = create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!("Gateway listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.realtime.cleanup();
    state.platform.storage().flush()?;
    info!("gateway shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl+c");
        std::future::pending::<()>().await;
    }
    info!("received shutdown signal");
}
