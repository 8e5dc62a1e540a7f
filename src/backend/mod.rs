//! Storage Backends
//!
//! One contract, two implementations: a distributed store with native
//! per-key expiry and an in-process map with lazily-checked expiry. The
//! backend is chosen once, when the cache service is built.

mod local;
mod redis;

pub use local::LocalBackend;
pub use redis::RedisBackend;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;
use tracing::info;

use crate::config::BackendConfig;
use crate::error::Result;

/// Lazy, non-restartable sequence of key batches produced by a prefix scan.
///
/// Each item is one batch; the stream ends once the backend reports the
/// scan complete. An `Err` item ends the scan.
pub type KeyBatches<'a> = BoxStream<'a, Result<Vec<String>>>;

// == Backend Kind ==
/// Which backend variant is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Distributed,
    Local,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Distributed => "distributed",
            BackendKind::Local => "local",
        }
    }
}

// == Cache Backend ==
/// Storage contract behind the cache service.
///
/// Values are opaque JSON text. Implementations report failures as
/// `Err`; the service turns those into safe defaults.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value`, overwriting any previous entry, for `ttl_seconds`.
    async fn set(&self, key: &str, value: String, ttl_seconds: u64) -> Result<()>;

    /// Removes `key`. Returns whether an entry was present.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Removes a batch of keys. Returns how many were present.
    async fn delete_many(&self, keys: &[String]) -> Result<usize>;

    /// Streams the keys starting with `prefix`, one batch at a time.
    fn scan_prefix<'a>(&'a self, prefix: &'a str) -> KeyBatches<'a>;

    /// Number of keys currently stored.
    async fn size(&self) -> Result<usize>;

    /// Drops expired entries the backend would otherwise keep around.
    async fn purge_expired(&self) -> Result<usize> {
        Ok(0)
    }
}

// == Factory ==
/// Builds the backend selected by `config`.
///
/// Distributed when both URL and token are present, local otherwise.
pub fn from_config(config: &BackendConfig) -> Result<Arc<dyn CacheBackend>> {
    match config.distributed_credentials() {
        Some((url, token)) => {
            let backend = RedisBackend::new(
                url,
                token,
                config.operation_timeout(),
                config.scan_batch_size,
            )?;
            info!("Distributed cache backend selected");
            Ok(Arc::new(backend))
        }
        None => {
            info!("Distributed store not configured, using in-process cache backend");
            Ok(Arc::new(LocalBackend::new()))
        }
    }
}
