//! Configuration Module
//!
//! Loads the cache and admin server configuration from environment variables.
//! The environment is read once at startup; everything downstream receives
//! explicit values.

use std::env;
use std::time::Duration;

/// Default timeout applied to each distributed-store operation.
pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 2000;

/// Default `COUNT` hint for each prefix scan round trip.
pub const DEFAULT_SCAN_BATCH_SIZE: usize = 100;

/// Backend selection input.
///
/// The distributed backend is chosen only when both the URL and the token
/// are present; otherwise the in-process backend is used.
#[derive(Clone, Default)]
pub struct BackendConfig {
    /// Distributed store URL (e.g. `redis://cache.internal:6379`)
    pub distributed_store_url: Option<String>,
    /// Distributed store auth token
    pub distributed_store_token: Option<String>,
    /// Per-operation timeout in milliseconds (distributed backend only)
    pub operation_timeout_ms: u64,
    /// Keys requested per scan round trip (distributed backend only)
    pub scan_batch_size: usize,
}

impl BackendConfig {
    /// Configuration that always selects the in-process backend.
    pub fn local() -> Self {
        Self {
            distributed_store_url: None,
            distributed_store_token: None,
            operation_timeout_ms: DEFAULT_OPERATION_TIMEOUT_MS,
            scan_batch_size: DEFAULT_SCAN_BATCH_SIZE,
        }
    }

    /// Configuration for a distributed store reachable at `url`.
    pub fn distributed(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            distributed_store_url: Some(url.into()),
            distributed_store_token: Some(token.into()),
            ..Self::local()
        }
    }

    /// Returns the credentials when both are present.
    pub fn distributed_credentials(&self) -> Option<(&str, &str)> {
        match (&self.distributed_store_url, &self.distributed_store_token) {
            (Some(url), Some(token)) => Some((url.as_str(), token.as_str())),
            _ => None,
        }
    }

    /// Per-operation timeout as a `Duration`.
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms.max(1))
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("distributed_store_url", &self.distributed_store_url)
            .field(
                "distributed_store_token",
                &self.distributed_store_token.as_ref().map(|_| "<redacted>"),
            )
            .field("operation_timeout_ms", &self.operation_timeout_ms)
            .field("scan_batch_size", &self.scan_batch_size)
            .finish()
    }
}

/// Admin server configuration parameters.
#[derive(Debug, Clone)]
pub struct Config {
    /// Cache backend selection
    pub backend: BackendConfig,
    /// HTTP server port
    pub server_port: u16,
    /// Expired-entry sweep interval in seconds, 0 disables the sweep
    pub sweep_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_REDIS_URL` - Distributed store URL (default: unset)
    /// - `CACHE_REDIS_TOKEN` - Distributed store token (default: unset)
    /// - `CACHE_OPERATION_TIMEOUT_MS` - Per-operation timeout (default: 2000)
    /// - `CACHE_SCAN_BATCH_SIZE` - Scan batch size (default: 100)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `SWEEP_INTERVAL` - Sweep interval in seconds (default: 60)
    pub fn from_env() -> Self {
        Self {
            backend: BackendConfig {
                distributed_store_url: non_empty_var("CACHE_REDIS_URL"),
                distributed_store_token: non_empty_var("CACHE_REDIS_TOKEN"),
                operation_timeout_ms: parsed_var("CACHE_OPERATION_TIMEOUT_MS")
                    .unwrap_or(DEFAULT_OPERATION_TIMEOUT_MS),
                scan_batch_size: parsed_var("CACHE_SCAN_BATCH_SIZE")
                    .filter(|n| *n > 0)
                    .unwrap_or(DEFAULT_SCAN_BATCH_SIZE),
            },
            server_port: parsed_var("SERVER_PORT").unwrap_or(3000),
            sweep_interval: parsed_var("SWEEP_INTERVAL").unwrap_or(60),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig::local(),
            server_port: 3000,
            sweep_interval: 60,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
