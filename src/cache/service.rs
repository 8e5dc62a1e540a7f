//! Cache Service
//!
//! Public facade in front of the selected backend. Reads are attributed to
//! a namespace for stats; every storage failure is downgraded to "as if
//! nothing were cached" in [`CacheService::guarded`].

use std::future::Future;
use std::sync::Arc;

use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::namespace::Namespace;
use super::stats::{StatsSnapshot, StatsTracker};
use crate::backend::{self, BackendKind, CacheBackend, LocalBackend};
use crate::config::BackendConfig;
use crate::error::{CacheError, Result};

/// TTL used by the `*_default` operations for keys outside every namespace.
pub const FALLBACK_TTL_SECONDS: u64 = 60;

// == Cache Service ==
/// Namespaced, fail-open cache facade.
///
/// Cloning is cheap and every clone shares the same backend and counters.
#[derive(Clone)]
pub struct CacheService {
    backend: Arc<dyn CacheBackend>,
    stats: Arc<StatsTracker>,
}

impl CacheService {
    // == Constructors ==
    /// Builds the service, selecting the backend from `config` once.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        Ok(Self::with_backend(backend::from_config(config)?))
    }

    /// Wraps an already constructed backend.
    pub fn with_backend(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend,
            stats: Arc::new(StatsTracker::new()),
        }
    }

    /// Service over a fresh in-process backend.
    pub fn local() -> Self {
        Self::with_backend(Arc::new(LocalBackend::new()))
    }

    // == Fail-open Wrapper ==
    /// Awaits a backend call; any failure is logged and becomes `None`.
    async fn guarded<T, F>(&self, op: &'static str, subject: &str, fut: F) -> Option<T>
    where
        F: Future<Output = Result<T>>,
    {
        match fut.await {
            Ok(value) => Some(value),
            Err(e) if e.is_fail_open() => {
                warn!(op, subject, error = %e, "cache backend call failed, treating as miss");
                None
            }
            Err(e) => {
                error!(op, subject, error = %e, "unexpected cache backend error");
                None
            }
        }
    }

    // == Get ==
    /// Reads and decodes `key`, recording a hit or a miss.
    ///
    /// Backend failures and payloads that do not decode as `T` are misses.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self
            .guarded("get", key, self.backend.get(key))
            .await
            .flatten();

        let value = raw.and_then(|raw| match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "cached payload did not decode, treating as miss");
                None
            }
        });

        let namespace = Namespace::resolve(key);
        if value.is_some() {
            self.stats.record_hit(namespace);
        } else {
            self.stats.record_miss(namespace);
        }
        value
    }

    // == Set ==
    /// Stores `value` under `key` for `ttl_seconds`.
    ///
    /// Returns `Ok(false)` when the backend failed; `Err` only when `value`
    /// cannot be serialized.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: u64,
    ) -> Result<bool> {
        let raw = serde_json::to_string(value)?;
        Ok(self
            .guarded("set", key, self.backend.set(key, raw, ttl_seconds))
            .await
            .is_some())
    }

    /// [`set`](Self::set) with the default TTL of the key's namespace.
    pub async fn set_default<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<bool> {
        self.set(key, value, default_ttl_for(key)).await
    }

    // == Delete ==
    /// Removes `key`. `true` when the backend accepted the delete, whether
    /// or not the key existed.
    pub async fn delete(&self, key: &str) -> bool {
        self.guarded("delete", key, self.backend.delete(key))
            .await
            .is_some()
    }

    // == Get or Set ==
    /// Returns the cached value or computes, stores, and returns a fresh one.
    ///
    /// Not single-flight: concurrent misses on one key each run `fetcher`
    /// and the last write wins. A fetcher error is returned unchanged and
    /// nothing is cached.
    pub async fn get_or_set<T, F, Fut, E>(
        &self,
        key: &str,
        fetcher: F,
        ttl_seconds: u64,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<CacheError>,
    {
        if let Some(cached) = self.get(key).await {
            return Ok(cached);
        }

        let value = fetcher().await?;
        self.set(key, &value, ttl_seconds).await?;
        Ok(value)
    }

    /// [`get_or_set`](Self::get_or_set) with the namespace default TTL.
    pub async fn get_or_set_default<T, F, Fut, E>(
        &self,
        key: &str,
        fetcher: F,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<CacheError>,
    {
        self.get_or_set(key, fetcher, default_ttl_for(key)).await
    }

    // == Invalidate Namespace ==
    /// Deletes every key in `namespace`, including the bare prefix key that
    /// `build_key` yields for zero parts.
    ///
    /// Keys present before the scan starts and not re-set meanwhile are
    /// removed; sets racing the scan may or may not survive. Returns `false`
    /// if any scan or delete step failed.
    pub async fn invalidate_namespace(&self, namespace: Namespace) -> bool {
        match self
            .guarded("invalidate", namespace.name(), self.drain_namespace(namespace))
            .await
        {
            Some(removed) => {
                info!(namespace = %namespace, removed, "cache namespace invalidated");
                true
            }
            None => false,
        }
    }

    /// Consumes the backend's scan, deleting each batch before the next.
    async fn drain_namespace(&self, namespace: Namespace) -> Result<usize> {
        let prefix = namespace.scan_prefix();
        let mut batches = self.backend.scan_prefix(&prefix);
        let mut removed = 0;

        while let Some(batch) = batches.next().await {
            let keys = batch?;
            if keys.is_empty() {
                continue;
            }
            removed += self.backend.delete_many(&keys).await?;
            debug!(prefix = %prefix, batch = keys.len(), removed, "deleted key batch");
        }

        // The scan pattern needs the delimiter, so the bare prefix key is
        // removed on its own.
        if self.backend.delete(namespace.prefix()).await? {
            removed += 1;
        }
        Ok(removed)
    }

    // == Maintenance ==
    /// Drops expired entries held by the backend. Returns 0 on failure.
    pub async fn purge_expired(&self) -> usize {
        self.guarded("purge_expired", "*", self.backend.purge_expired())
            .await
            .unwrap_or(0)
    }

    /// Number of keys in the backend, `None` when it cannot be determined.
    pub async fn key_count(&self) -> Option<usize> {
        self.guarded("size", "*", self.backend.size()).await
    }

    // == Introspection ==
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn is_distributed_backend_active(&self) -> bool {
        self.backend_kind() == BackendKind::Distributed
    }

    // == Stats ==
    /// Observability snapshot: backend type, key count, and hit/miss views.
    pub async fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            backend: self.backend_kind(),
            key_count: self.key_count().await,
            global: self.stats.global(),
            per_namespace: self.stats.per_namespace(),
        }
    }

    /// Clears all hit/miss counters.
    pub fn reset_stats(&self) {
        self.stats.reset();
    }
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("backend", &self.backend_kind())
            .finish()
    }
}

/// Default TTL of the namespace `key` belongs to.
pub fn default_ttl_for(key: &str) -> u64 {
    Namespace::resolve(key)
        .map(Namespace::default_ttl_seconds)
        .unwrap_or(FALLBACK_TTL_SECONDS)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::KeyBatches;
    use crate::cache::build_key;
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// Backend whose every call fails like an unreachable store.
    struct DownBackend;

    #[async_trait]
    impl CacheBackend for DownBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::Distributed
        }
        async fn get(&self, _: &str) -> Result<Option<String>> {
            Err(CacheError::Backend("connection refused".into()))
        }
        async fn set(&self, _: &str, _: String, _: u64) -> Result<()> {
            Err(CacheError::Backend("connection refused".into()))
        }
        async fn delete(&self, _: &str) -> Result<bool> {
            Err(CacheError::Backend("connection refused".into()))
        }
        async fn delete_many(&self, _: &[String]) -> Result<usize> {
            Err(CacheError::Backend("connection refused".into()))
        }
        fn scan_prefix<'a>(&'a self, _: &'a str) -> KeyBatches<'a> {
            Box::pin(futures::stream::once(async {
                Err(CacheError::Backend("connection refused".into()))
            }))
        }
        async fn size(&self) -> Result<usize> {
            Err(CacheError::Backend("connection refused".into()))
        }
    }

    /// Backend that serves scans in fixed-size batches and records the
    /// interleaving of scan and delete calls.
    struct PagedBackend {
        keys: Mutex<BTreeMap<String, String>>,
        page: usize,
        log: Mutex<Vec<String>>,
    }

    impl PagedBackend {
        fn with_keys(keys: &[String], page: usize) -> Self {
            Self {
                keys: Mutex::new(keys.iter().map(|k| (k.clone(), "0".into())).collect()),
                page,
                log: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CacheBackend for PagedBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::Distributed
        }
        async fn get(&self, key: &str) -> Result<Option<String>> {
            Ok(self.keys.lock().unwrap().get(key).cloned())
        }
        async fn set(&self, key: &str, value: String, _: u64) -> Result<()> {
            self.keys.lock().unwrap().insert(key.to_string(), value);
            Ok(())
        }
        async fn delete(&self, key: &str) -> Result<bool> {
            Ok(self.keys.lock().unwrap().remove(key).is_some())
        }
        async fn delete_many(&self, keys: &[String]) -> Result<usize> {
            self.log.lock().unwrap().push(format!("del {}", keys.len()));
            let mut map = self.keys.lock().unwrap();
            Ok(keys.iter().filter(|k| map.remove(*k).is_some()).count())
        }
        fn scan_prefix<'a>(&'a self, prefix: &'a str) -> KeyBatches<'a> {
            // Each pull re-reads the live map, so batches only stay correct
            // if the consumer deletes a batch before pulling the next one.
            Box::pin(futures::stream::unfold(false, move |done| async move {
                if done {
                    return None;
                }
                self.log.lock().unwrap().push("scan".to_string());
                let batch: Vec<String> = self
                    .keys
                    .lock()
                    .unwrap()
                    .keys()
                    .filter(|k| k.starts_with(prefix))
                    .take(self.page)
                    .cloned()
                    .collect();
                let finished = batch.len() < self.page;
                Some((Ok(batch), finished))
            }))
        }
        async fn size(&self) -> Result<usize> {
            Ok(self.keys.lock().unwrap().len())
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Reading {
        temp: i32,
    }

    #[tokio::test]
    async fn test_set_then_get_round_trips() {
        let cache = CacheService::local();
        let key = build_key(Namespace::Weather, &["19020"]);

        assert!(cache.set(&key, &Reading { temp: 72 }, 300).await.unwrap());
        assert_eq!(cache.get::<Reading>(&key).await, Some(Reading { temp: 72 }));
    }

    #[tokio::test]
    async fn test_get_missing_is_none_and_counts_miss() {
        let cache = CacheService::local();
        assert_eq!(cache.get::<Reading>("weather:00000").await, None);

        let stats = cache.stats().await;
        assert_eq!(stats.global.misses, 1);
        assert_eq!(stats.per_namespace[&Namespace::Weather].misses, 1);
    }

    #[tokio::test]
    async fn test_decode_mismatch_is_miss() {
        let cache = CacheService::local();
        cache.set("weather:1", "not a reading", 60).await.unwrap();

        assert_eq!(cache.get::<Reading>("weather:1").await, None);
        assert_eq!(cache.stats().await.global.misses, 1);
    }

    #[tokio::test]
    async fn test_delete_reports_success_even_when_absent() {
        let cache = CacheService::local();
        cache.set("dashboard:main", &1, 30).await.unwrap();

        assert!(cache.delete("dashboard:main").await);
        assert!(cache.delete("dashboard:main").await);
        assert_eq!(cache.get::<i32>("dashboard:main").await, None);
    }

    #[tokio::test]
    async fn test_writes_do_not_touch_stats() {
        let cache = CacheService::local();
        cache.set("analytics:x", &1, 60).await.unwrap();
        cache.delete("analytics:x").await;

        let global = cache.stats().await.global;
        assert_eq!((global.hits, global.misses), (0, 0));
    }

    #[tokio::test]
    async fn test_backend_failures_become_safe_defaults() {
        let cache = CacheService::with_backend(Arc::new(DownBackend));

        assert_eq!(cache.get::<i32>("weather:1").await, None);
        assert!(!cache.set("weather:1", &1, 60).await.unwrap());
        assert!(!cache.delete("weather:1").await);
        assert!(!cache.invalidate_namespace(Namespace::Weather).await);
        assert_eq!(cache.purge_expired().await, 0);

        let stats = cache.stats().await;
        assert_eq!(stats.key_count, None);
        assert_eq!(stats.per_namespace[&Namespace::Weather].misses, 1);
    }

    #[tokio::test]
    async fn test_get_or_set_with_down_backend_still_returns_value() {
        let cache = CacheService::with_backend(Arc::new(DownBackend));
        let value: i32 = cache
            .get_or_set("analytics:total", || async { Ok::<_, CacheError>(42) }, 60)
            .await
            .unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_get_or_set_fetcher_error_propagates_and_caches_nothing() {
        #[derive(Debug, PartialEq)]
        enum FetchError {
            Upstream,
            Cache,
        }
        impl From<CacheError> for FetchError {
            fn from(_: CacheError) -> Self {
                FetchError::Cache
            }
        }

        let cache = CacheService::local();
        let result: std::result::Result<i32, FetchError> = cache
            .get_or_set("weather:1", || async { Err(FetchError::Upstream) }, 60)
            .await;

        assert_eq!(result, Err(FetchError::Upstream));
        assert_eq!(cache.key_count().await, Some(0));
    }

    #[tokio::test]
    async fn test_invalidation_interleaves_scan_and_delete() {
        let keys: Vec<String> = (0..7)
            .map(|i| build_key(Namespace::Dashboard, &[format!("team{}", i)]))
            .chain(std::iter::once(build_key(Namespace::Weather, &["19020"])))
            .collect();
        let backend = Arc::new(PagedBackend::with_keys(&keys, 3));
        let cache = CacheService::with_backend(backend.clone());

        assert!(cache.invalidate_namespace(Namespace::Dashboard).await);

        assert_eq!(
            *backend.log.lock().unwrap(),
            vec!["scan", "del 3", "scan", "del 3", "scan", "del 1"]
        );
        assert_eq!(cache.key_count().await, Some(1));
        assert_eq!(cache.get::<i32>("weather:19020").await, Some(0));
    }

    #[tokio::test]
    async fn test_invalidation_of_empty_namespace_succeeds() {
        let cache = CacheService::local();
        assert!(cache.invalidate_namespace(Namespace::Competitors).await);
    }

    #[tokio::test]
    async fn test_invalidation_removes_key_built_without_parts() {
        let cache = CacheService::local();
        let bare = build_key::<&str>(Namespace::Dashboard, &[]);
        assert_eq!(bare, "dashboard");
        cache.set(&bare, &1, 30).await.unwrap();
        cache.set("dashboard:main", &2, 30).await.unwrap();
        cache.set("analytics", &3, 60).await.unwrap();

        assert!(cache.invalidate_namespace(Namespace::Dashboard).await);

        assert_eq!(cache.get::<i32>(&bare).await, None);
        assert_eq!(cache.get::<i32>("dashboard:main").await, None);
        assert_eq!(cache.get::<i32>("analytics").await, Some(3));
    }

    #[tokio::test]
    async fn test_default_ttl_resolution() {
        assert_eq!(default_ttl_for("dashboard:main"), 30);
        assert_eq!(default_ttl_for("imagery:abc"), 3600);
        assert_eq!(default_ttl_for("misc:thing"), FALLBACK_TTL_SECONDS);
    }

    #[tokio::test]
    async fn test_backend_introspection() {
        let cache = CacheService::local();
        assert!(!cache.is_distributed_backend_active());
        assert_eq!(cache.stats().await.backend, BackendKind::Local);

        let cache = CacheService::with_backend(Arc::new(DownBackend));
        assert!(cache.is_distributed_backend_active());
    }
}
