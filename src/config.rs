//! Configuration types.

use std::time::Duration;

use crate::backend::RestBackendConfig;
use crate::error::ConfigError;

/// Signup behaviour knobs.
#[derive(Debug, Clone)]
pub struct SignupConfig {
    /// Quiet period after the last keystroke before an availability lookup.
    pub lookup_debounce: Duration,
    /// Upper bound on a single availability lookup. `None` waits forever.
    pub lookup_timeout: Option<Duration>,
    /// Insert each tag batch concurrently instead of one by one.
    pub parallel_tag_inserts: bool,
}

impl Default for SignupConfig {
    fn default() -> Self {
        Self {
            lookup_debounce: Duration::from_millis(500),
            lookup_timeout: Some(Duration::from_secs(10)),
            parallel_tag_inserts: false,
        }
    }
}

impl SignupConfig {
    /// Read overrides from `TWINDLE_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let lookup_debounce = std::env::var("TWINDLE_LOOKUP_DEBOUNCE_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.lookup_debounce);

        // 0 disables the timeout
        let lookup_timeout = match std::env::var("TWINDLE_LOOKUP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.lookup_timeout,
        };

        let parallel_tag_inserts = std::env::var("TWINDLE_PARALLEL_TAG_INSERTS")
            .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
            .unwrap_or(defaults.parallel_tag_inserts);

        Self {
            lookup_debounce,
            lookup_timeout,
            parallel_tag_inserts,
        }
    }
}

/// Server configuration for the binary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Idle signup sessions are dropped after this long.
    pub session_ttl: Duration,
    /// Hosted backend. `None` runs against the in-memory backend.
    pub backend: Option<RestBackendConfig>,
    pub signup: SignupConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match std::env::var("TWINDLE_PORT") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "TWINDLE_PORT".into(),
                message: format!("{raw:?} is not a port number"),
            })?,
            Err(_) => 8080,
        };

        let session_ttl = std::env::var("TWINDLE_SESSION_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(3600));

        Ok(Self {
            port,
            session_ttl,
            backend: RestBackendConfig::from_env()?,
            signup: SignupConfig::from_env(),
        })
    }
}
