//! User service configuration.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use common::{DatabaseConfig, MetricsConfig};

/// User service configuration.
#[derive(Debug, Clone)]
pub struct UserServiceConfig {
    /// Connection pool settings
    pub database: DatabaseConfig,
    /// Metrics exporter bind address
    pub metrics: MetricsConfig,
    /// Create the users table on startup if missing
    pub create_schema: bool,
    /// Default deadline for one-off requests issued by the CLI
    pub request_timeout_ms: u64,
}

impl UserServiceConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            database: DatabaseConfig {
                url: env::var("USER_SERVICE_DATABASE_URL")
                    .or_else(|_| env::var("DATABASE_URL"))
                    .unwrap_or(defaults.database.url),
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or(defaults.database.max_connections),
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS")
                    .unwrap_or(defaults.database.min_connections),
                acquire_timeout_ms: parse_env("DATABASE_ACQUIRE_TIMEOUT_MS")
                    .unwrap_or(defaults.database.acquire_timeout_ms),
            },
            metrics: MetricsConfig {
                host: env::var("METRICS_HOST").unwrap_or(defaults.metrics.host),
                port: parse_env("METRICS_PORT").unwrap_or(defaults.metrics.port),
            },
            create_schema: parse_env("USER_SERVICE_CREATE_SCHEMA")
                .unwrap_or(defaults.create_schema),
            request_timeout_ms: parse_env("USER_SERVICE_REQUEST_TIMEOUT_MS")
                .unwrap_or(defaults.request_timeout_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for UserServiceConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            metrics: MetricsConfig::default(),
            create_schema: false,
            request_timeout_ms: 5000,
        }
    }
}

fn parse_env<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}
