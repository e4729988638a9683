//! Gateway configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use tasklist_core::config::{DEFAULT_SESSION_TTL, DEVELOPMENT_JWT_SECRET};
use tasklist_core::PlatformConfig;

/// tasklist HTTP/WebSocket gateway command line arguments.
#[derive(Debug, Parser)]
#[command(name = "tasklist-gateway")]
#[command(about = "HTTP/WebSocket gateway for tasklist")]
pub struct Args {
    /// Address to listen on for HTTP requests.
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    pub listen: String,

    /// Data directory. A temporary database is used when unset.
    #[arg(short, long, env = "TASKLIST_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Secret used to sign session tokens.
    #[arg(long, env = "TASKLIST_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Lifetime of issued session tokens, in seconds.
    #[arg(long, default_value_t = DEFAULT_SESSION_TTL.as_secs())]
    pub session_ttl_secs: u64,
}

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address to listen on for HTTP requests.
    pub listen_addr: String,
    /// Data directory, `None` for a temporary database.
    pub data_path: Option<PathBuf>,
    /// Session token signing secret.
    pub jwt_secret: String,
    /// Lifetime of issued session tokens.
    pub session_ttl: Duration,
}

impl GatewayConfig {
    /// Platform configuration derived from this gateway configuration.
    pub fn platform_config(&self) -> PlatformConfig {
        let config = match &self.data_path {
            Some(path) => PlatformConfig::new(path.clone()),
            None => PlatformConfig::temporary(),
        };
        config
            .with_jwt_secret(self.jwt_secret.clone())
            .with_session_ttl(self.session_ttl)
    }

    /// Whether the built-in development secret is in use.
    pub fn uses_development_secret(&self) -> bool {
        self.jwt_secret == DEVELOPMENT_JWT_SECRET
    }
}

impl From<&Args> for GatewayConfig {
    fn from(args: &Args) -> Self {
        Self {
            listen_addr: args.listen.clone(),
            data_path: args.data_dir.clone(),
            jwt_secret: args
                .jwt_secret
                .clone()
                .unwrap_or_else(|| DEVELOPMENT_JWT_SECRET.to_string()),
            session_ttl: Duration::from_secs(args.session_ttl_secs),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            data_path: None,
            jwt_secret: DEVELOPMENT_JWT_SECRET.to_string(),
            session_ttl: DEFAULT_SESSION_TTL,
        }
    }
}
