//! Platform configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default lifetime of an issued session token (1 hour).
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(3600);

/// Default lifetime of a password recovery code (1 hour).
pub const DEFAULT_RECOVERY_TTL: Duration = Duration::from_secs(3600);

/// Default minimum password length.
pub const DEFAULT_MIN_PASSWORD_LENGTH: usize = 6;

/// Secret used when none is configured. Only suitable for local use.
pub const DEVELOPMENT_JWT_SECRET: &str = "tasklist-development-secret";

/// Configuration for [`LocalPlatform`](crate::LocalPlatform).
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Storage directory. `None` opens a temporary database.
    pub data_path: Option<PathBuf>,

    /// HMAC secret for session tokens.
    pub jwt_secret: String,

    /// Lifetime of issued session tokens.
    pub session_ttl: Duration,

    /// Lifetime of password recovery codes.
    pub recovery_ttl: Duration,

    /// Clock skew tolerated when validating token expiry, in seconds.
    pub token_leeway_secs: u64,

    /// Minimum password length accepted at sign-up.
    pub min_password_length: usize,

    /// Enable sled compression.
    pub use_compression: bool,
}

impl PlatformConfig {
    /// Persistent platform stored under `data_path`.
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: Some(data_path.into()),
            ..Self::temporary()
        }
    }

    /// Platform backed by a temporary database, removed on drop.
    pub fn temporary() -> Self {
        Self {
            data_path: None,
            jwt_secret: DEVELOPMENT_JWT_SECRET.to_string(),
            session_ttl: DEFAULT_SESSION_TTL,
            recovery_ttl: DEFAULT_RECOVERY_TTL,
            token_leeway_secs: 0,
            min_password_length: DEFAULT_MIN_PASSWORD_LENGTH,
            use_compression: true,
        }
    }

    /// Set the token signing secret.
    pub fn with_jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.jwt_secret = secret.into();
        self
    }

    /// Set the session token lifetime.
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Set the recovery code lifetime.
    pub fn with_recovery_ttl(mut self, ttl: Duration) -> Self {
        self.recovery_ttl = ttl;
        self
    }

    /// Set the expiry leeway.
    pub fn with_token_leeway(mut self, secs: u64) -> Self {
        self.token_leeway_secs = secs;
        self
    }

    /// Set the minimum password length.
    pub fn with_min_password_length(mut self, len: usize) -> Self {
        self.min_password_length = len;
        self
    }

    pub(crate) fn to_sled_config(&self) -> sled::Config {
        let config = sled::Config::new().use_compression(self.use_compression);
        match &self.data_path {
            Some(path) => config.path(path),
            None => config.temporary(true),
        }
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self::temporary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlatformConfig::default();
        assert!(config.data_path.is_none());
        assert_eq!(config.session_ttl, DEFAULT_SESSION_TTL);
        assert_eq!(config.recovery_ttl, DEFAULT_RECOVERY_TTL);
        assert_eq!(config.min_password_length, DEFAULT_MIN_PASSWORD_LENGTH);
    }

    #[test]
    fn test_builder() {
        let config = PlatformConfig::new("/var/lib/tasklist")
            .with_jwt_secret("s3cret")
            .with_session_ttl(Duration::from_secs(60))
            .with_min_password_length(10);

        assert_eq!(config.data_path, Some(PathBuf::from("/var/lib/tasklist")));
        assert_eq!(config.jwt_secret, "s3cret");
        assert_eq!(config.session_ttl, Duration::from_secs(60));
        assert_eq!(config.min_password_length, 10);
    }
}
