//! Distributed Backend
//!
//! Thin wrapper over a Redis-protocol store. Expiry is native (`SET .. EX`),
//! prefix enumeration uses cursor-based `SCAN`.

use std::future::Future;
use std::time::Duration;

use ::redis::aio::MultiplexedConnection;
use ::redis::{Client, IntoConnectionInfo, RedisResult};
use async_trait::async_trait;
use futures::stream;

use super::{BackendKind, CacheBackend, KeyBatches};
use crate::error::{CacheError, Result};

/// Cursor value that both starts and ends a `SCAN` iteration.
const SCAN_START: u64 = 0;

// == Redis Backend ==
/// Distributed cache backend.
#[derive(Clone)]
pub struct RedisBackend {
    client: Client,
    timeout: Duration,
    scan_batch_size: usize,
}

/// Position of an in-flight prefix scan.
enum ScanState {
    Start,
    Next(u64),
    Done,
}

impl RedisBackend {
    // == Constructor ==
    /// Creates a client for `url`, authenticating with `token`.
    ///
    /// No connection is made here; each operation opens a multiplexed
    /// connection and fails on its own if the store is unreachable.
    pub fn new(url: &str, token: &str, timeout: Duration, scan_batch_size: usize) -> Result<Self> {
        let mut info = url
            .into_connection_info()
            .map_err(|e| CacheError::Config(format!("invalid distributed store URL: {}", e)))?;
        info.redis.password = Some(token.to_string());

        let client = Client::open(info)
            .map_err(|e| CacheError::Config(format!("failed to create Redis client: {}", e)))?;

        Ok(Self {
            client,
            timeout,
            scan_batch_size: scan_batch_size.max(1),
        })
    }

    async fn connection(&self) -> RedisResult<MultiplexedConnection> {
        self.client.get_multiplexed_async_connection().await
    }

    /// Runs one store round trip under the operation timeout.
    async fn timed<T, F>(&self, op: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(CacheError::from),
            Err(_) => Err(CacheError::Backend(format!(
                "{} timed out after {}ms",
                op,
                self.timeout.as_millis()
            ))),
        }
    }

    async fn scan_page(&self, cursor: u64, pattern: &str) -> Result<(u64, Vec<String>)> {
        self.timed("SCAN", async {
            let mut conn = self.connection().await?;
            ::redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(self.scan_batch_size)
                .query_async(&mut conn)
                .await
        })
        .await
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Distributed
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.timed("GET", async {
            let mut conn = self.connection().await?;
            ::redis::cmd("GET").arg(key).query_async(&mut conn).await
        })
        .await
    }

    async fn set(&self, key: &str, value: String, ttl_seconds: u64) -> Result<()> {
        // EX 0 is rejected by the store; never write a key without expiry.
        let ttl = ttl_seconds.max(1);
        self.timed("SET", async {
            let mut conn = self.connection().await?;
            ::redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("EX")
                .arg(ttl)
                .query_async(&mut conn)
                .await
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let removed: usize = self
            .timed("DEL", async {
                let mut conn = self.connection().await?;
                ::redis::cmd("DEL").arg(key).query_async(&mut conn).await
            })
            .await?;
        Ok(removed > 0)
    }

    async fn delete_many(&self, keys: &[String]) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.timed("DEL", async {
            let mut conn = self.connection().await?;
            ::redis::cmd("DEL").arg(keys).query_async(&mut conn).await
        })
        .await
    }

    // == Scan ==
    /// One `SCAN` round trip per batch, starting and ending at cursor 0.
    ///
    /// Batches are pulled lazily, so a consumer that deletes each batch
    /// before asking for the next gets scan-then-delete interleaving.
    fn scan_prefix<'a>(&'a self, prefix: &'a str) -> KeyBatches<'a> {
        let pattern = format!("{}*", escape_glob(prefix));

        Box::pin(stream::try_unfold(ScanState::Start, move |state| {
            let pattern = pattern.clone();
            async move {
                let cursor = match state {
                    ScanState::Start => SCAN_START,
                    ScanState::Next(cursor) => cursor,
                    ScanState::Done => return Ok::<_, CacheError>(None),
                };

                let (next, keys) = self.scan_page(cursor, &pattern).await?;
                let state = if next == SCAN_START {
                    ScanState::Done
                } else {
                    ScanState::Next(next)
                };
                Ok(Some((keys, state)))
            }
        }))
    }

    async fn size(&self) -> Result<usize> {
        self.timed("DBSIZE", async {
            let mut conn = self.connection().await?;
            ::redis::cmd("DBSIZE").query_async(&mut conn).await
        })
        .await
    }
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend")
            .field("addr", &self.client.get_connection_info().addr.to_string())
            .field("timeout", &self.timeout)
            .field("scan_batch_size", &self.scan_batch_size)
            .finish()
    }
}

/// Escapes glob metacharacters so a prefix matches literally in `MATCH`.
fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
