//! Centralized server configuration.
//!
//! Loaded via the `config` crate from environment variables, with `__`
//! separating nested keys (`RATE_LIMIT__MAX_REQUESTS`).

use integration_hub_access::RateLimitConfig;
use integration_hub_vault::{ENCRYPTION_KEY_NAME, SecretStore};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Server configuration.
#[derive(Deserialize)]
pub struct ServerConfig {
    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// Address the HTTP listener binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Milliseconds a request's access check may take before it fails
    /// with 503.
    #[serde(default = "default_access_deadline_ms")]
    pub access_deadline_ms: u64,

    /// Per-principal rate limiting.
    #[serde(default)]
    pub rate_limit: RateLimitSettings,

    /// Hex credential encryption key, read without type coercion.
    #[serde(skip)]
    encryption_key: Option<String>,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RateLimitSettings {
    /// Requests allowed per window.
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Window length in seconds.
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u32,

    /// Interval between sweeps of stale windows, in seconds.
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,

    /// Windows a finished window is retained before eviction.
    #[serde(default = "default_eviction_grace_windows")]
    pub eviction_grace_windows: u32,

    /// Tracked keys at which an inline sweep runs.
    #[serde(default)]
    pub max_tracked_keys: Option<usize>,
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_access_deadline_ms() -> u64 {
    5000
}

fn default_max_requests() -> u32 {
    60
}

fn default_window_seconds() -> u32 {
    60
}

fn default_sweep_interval_seconds() -> u64 {
    300
}

fn default_eviction_grace_windows() -> u32 {
    1
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_seconds: default_window_seconds(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
            eviction_grace_windows: default_eviction_grace_windows(),
            max_tracked_keys: None,
        }
    }
}

impl RateLimitSettings {
    /// Converts to the limiter's configuration.
    #[must_use]
    pub fn limiter_config(&self) -> RateLimitConfig {
        let config = RateLimitConfig::new(self.max_requests, self.window_seconds)
            .with_eviction_grace_windows(self.eviction_grace_windows);
        match self.max_tracked_keys {
            Some(max) => config.with_max_tracked_keys(max),
            None => config,
        }
    }
}

impl ServerConfig {
    /// Deadline for one request's access check.
    #[must_use]
    pub fn access_deadline(&self) -> Duration {
        Duration::from_millis(self.access_deadline_ms)
    }

    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let mut server_config: Self = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        // An all-digit hex key must keep its leading zeros.
        server_config.encryption_key = config::Config::builder()
            .add_source(config::Environment::default())
            .build()?
            .get_string(&ENCRYPTION_KEY_NAME.to_lowercase())
            .ok();

        Ok(server_config)
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("database_url", &"..")
            .field("bind_addr", &self.bind_addr)
            .field("access_deadline_ms", &self.access_deadline_ms)
            .field("rate_limit", &self.rate_limit)
            .field("encryption_key", &self.encryption_key.as_ref().map(|_| ".."))
            .finish()
    }
}

impl SecretStore for ServerConfig {
    fn get(&self, name: &str) -> Option<String> {
        if name == ENCRYPTION_KEY_NAME {
            self.encryption_key.clone()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_overrides(pairs: &[(&str, &str)]) -> ServerConfig {
        let mut builder = config::Config::builder();
        for (key, value) in pairs {
            builder = builder.set_override(*key, *value).unwrap();
        }
        builder.build().unwrap().try_deserialize().unwrap()
    }

    #[test]
    fn rate_limit_settings_have_correct_defaults() {
        let settings = RateLimitSettings::default();
        assert_eq!(settings.max_requests, 60);
        assert_eq!(settings.window_seconds, 60);
        assert_eq!(settings.sweep_interval_seconds, 300);
        assert_eq!(settings.eviction_grace_windows, 1);
        assert_eq!(settings.max_tracked_keys, None);
    }

    #[test]
    fn only_database_url_is_required() {
        let config = from_overrides(&[("database_url", "postgres://localhost/hub")]);
        assert_eq!(config.database_url, "postgres://localhost/hub");
        assert_eq!(config.bind_addr, "127.0.0.1:3000");
        assert_eq!(config.access_deadline(), Duration::from_secs(5));
        assert_eq!(config.rate_limit, RateLimitSettings::default());
    }

    #[test]
    fn nested_rate_limit_overrides() {
        let config = from_overrides(&[
            ("database_url", "postgres://localhost/hub"),
            ("rate_limit.max_requests", "10"),
            ("rate_limit.max_tracked_keys", "5000"),
            ("access_deadline_ms", "250"),
        ]);
        assert_eq!(config.access_deadline(), Duration::from_millis(250));
        assert_eq!(config.rate_limit.max_requests, 10);
        assert_eq!(config.rate_limit.window_seconds, 60);

        let limiter = config.rate_limit.limiter_config();
        assert_eq!(limiter.max_requests, 10);
        assert_eq!(limiter.max_tracked_keys, Some(5000));
    }

    #[test]
    fn secret_store_exposes_only_the_encryption_key() {
        let mut config = from_overrides(&[("database_url", "postgres://localhost/hub")]);
        assert_eq!(config.get(ENCRYPTION_KEY_NAME), None);

        config.encryption_key = Some("00".repeat(32));
        assert_eq!(config.get(ENCRYPTION_KEY_NAME), Some("00".repeat(32)));
        assert_eq!(config.get("DATABASE_URL"), None);
        assert!(!format!("{config:?}").contains(&"00".repeat(32)));
    }
}
