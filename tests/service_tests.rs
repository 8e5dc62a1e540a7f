//! Integration Tests for the Cache Service
//!
//! Drives the public facade end to end over both backends.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use namespace_cache::backend::LocalBackend;
use namespace_cache::cache::{ManualClock, FALLBACK_TTL_SECONDS};
use namespace_cache::{build_key, hash_string, BackendConfig, CacheError, CacheService, Namespace};
use serde::{Deserialize, Serialize};
use tokio::sync::{Barrier, Notify};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Reading {
    temp: i32,
}

// == Helper Functions ==

fn service_with_clock() -> (CacheService, ManualClock) {
    let clock = ManualClock::new();
    let backend = LocalBackend::with_clock(Arc::new(clock.clone()));
    (CacheService::with_backend(Arc::new(backend)), clock)
}

// == Expiry ==

#[tokio::test]
async fn test_weather_entry_expires_after_ttl() {
    let (cache, clock) = service_with_clock();
    let key = build_key(Namespace::Weather, &["19020"]);
    assert_eq!(key, "weather:19020");

    assert!(cache.set(&key, &Reading { temp: 72 }, 300).await.unwrap());

    clock.advance(Duration::from_secs(299));
    assert_eq!(cache.get::<Reading>(&key).await, Some(Reading { temp: 72 }));

    clock.advance(Duration::from_secs(2));
    assert_eq!(cache.get::<Reading>(&key).await, None);
}

#[tokio::test]
async fn test_purge_expired_drops_stale_entries() {
    let (cache, clock) = service_with_clock();
    cache.set("dashboard:main", &1, 30).await.unwrap();
    cache.set("imagery:abc", &2, 3600).await.unwrap();

    clock.advance(Duration::from_secs(31));

    assert_eq!(cache.purge_expired().await, 1);
    assert_eq!(cache.key_count().await, Some(1));
}

// == Namespace Invalidation ==

#[tokio::test]
async fn test_invalidate_dashboard_leaves_weather() {
    let cache = CacheService::local();
    cache.set("dashboard:main", &1, 30).await.unwrap();
    cache.set("dashboard:team:7", &2, 30).await.unwrap();
    cache.set("weather:19020", &Reading { temp: 72 }, 300).await.unwrap();

    assert!(cache.invalidate_namespace(Namespace::Dashboard).await);

    assert_eq!(cache.get::<i32>("dashboard:main").await, None);
    assert_eq!(cache.get::<i32>("dashboard:team:7").await, None);
    assert_eq!(
        cache.get::<Reading>("weather:19020").await,
        Some(Reading { temp: 72 })
    );
}

#[tokio::test]
async fn test_invalidate_does_not_touch_similar_prefixes() {
    let cache = CacheService::local();
    cache.set("leadscore:42", &90, 120).await.unwrap();
    cache.set("leadscores-archive:42", &10, 120).await.unwrap();

    assert!(cache.invalidate_namespace(Namespace::LeadScores).await);

    assert_eq!(cache.get::<i32>("leadscore:42").await, None);
    assert_eq!(cache.get::<i32>("leadscores-archive:42").await, Some(10));
}

// == Get or Set ==

#[tokio::test]
async fn test_get_or_set_calls_fetcher_once_when_sequential() {
    let cache = CacheService::local();
    let calls = AtomicUsize::new(0);

    for _ in 0..2 {
        let value: i32 = cache
            .get_or_set(
                "analytics:weekly",
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, CacheError>(17)
                },
                60,
            )
            .await
            .unwrap();
        assert_eq!(value, 17);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_get_or_set_runs_both_fetchers_last_write_wins() {
    let cache = CacheService::local();
    let both_missed = Arc::new(Barrier::new(2));
    let first_written = Arc::new(Notify::new());
    let calls = Arc::new(AtomicUsize::new(0));

    let first = {
        let both_missed = both_missed.clone();
        let calls = calls.clone();
        let cache = cache.clone();
        let first_written = first_written.clone();
        async move {
            let result = cache
                .get_or_set(
                    "competitors:acme",
                    || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        both_missed.wait().await;
                        Ok::<_, CacheError>(1)
                    },
                    600,
                )
                .await;
            first_written.notify_one();
            result
        }
    };

    let second = {
        let calls = calls.clone();
        let cache = cache.clone();
        async move {
            cache
                .get_or_set(
                    "competitors:acme",
                    || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        both_missed.wait().await;
                        // Hold this write until the first caller has stored its value.
                        first_written.notified().await;
                        Ok::<_, CacheError>(2)
                    },
                    600,
                )
                .await
        }
    };

    let (a, b) = tokio::join!(first, second);

    assert_eq!(a.unwrap(), 1);
    assert_eq!(b.unwrap(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.get::<i32>("competitors:acme").await, Some(2));
}

#[tokio::test]
async fn test_set_default_expires_at_namespace_ttl() {
    let (cache, clock) = service_with_clock();
    let key = build_key(Namespace::Weather, &["19020"]);

    assert!(cache.set_default(&key, &Reading { temp: 72 }).await.unwrap());

    clock.advance(Duration::from_secs(300));
    assert_eq!(cache.get::<Reading>(&key).await, Some(Reading { temp: 72 }));

    clock.advance(Duration::from_secs(1));
    assert_eq!(cache.get::<Reading>(&key).await, None);
}

#[tokio::test]
async fn test_set_default_unscoped_key_uses_fallback_ttl() {
    let (cache, clock) = service_with_clock();

    assert!(cache.set_default("misc:thing", &7).await.unwrap());

    clock.advance(Duration::from_secs(FALLBACK_TTL_SECONDS));
    assert_eq!(cache.get::<i32>("misc:thing").await, Some(7));

    clock.advance(Duration::from_secs(1));
    assert_eq!(cache.get::<i32>("misc:thing").await, None);
}

#[tokio::test]
async fn test_get_or_set_default_uses_namespace_ttl() {
    let (cache, clock) = service_with_clock();

    let value: i32 = cache
        .get_or_set_default("dashboard:main", || async { Ok::<_, CacheError>(5) })
        .await
        .unwrap();
    assert_eq!(value, 5);

    clock.advance(Duration::from_secs(30));
    assert_eq!(cache.get::<i32>("dashboard:main").await, Some(5));

    clock.advance(Duration::from_secs(1));
    assert_eq!(cache.get::<i32>("dashboard:main").await, None);
}

// == Stats ==

#[tokio::test]
async fn test_stats_per_namespace() {
    let cache = CacheService::local();
    cache.set("weather:19020", &Reading { temp: 72 }, 300).await.unwrap();

    cache.get::<Reading>("weather:19020").await;
    cache.get::<Reading>("weather:19020").await;
    cache.get::<Reading>("weather:10001").await;
    cache.get::<i32>("dashboard:main").await;
    cache.get::<i32>("unscoped").await;

    let stats = cache.stats().await;
    let weather = &stats.per_namespace[&Namespace::Weather];
    assert_eq!((weather.hits, weather.misses, weather.hit_rate), (2, 1, 67));

    let dashboard = &stats.per_namespace[&Namespace::Dashboard];
    assert_eq!((dashboard.hits, dashboard.misses, dashboard.hit_rate), (0, 1, 0));

    assert_eq!((stats.global.hits, stats.global.misses), (2, 3));
    assert_eq!(stats.global.hit_rate, 40);

    cache.reset_stats();
    let stats = cache.stats().await;
    assert_eq!((stats.global.hits, stats.global.misses), (0, 0));
}

// == Hashing ==

#[test]
fn test_hash_string_known_values() {
    assert_eq!(hash_string("foo"), "26di");
    assert_eq!(hash_string(""), "0");

    let key = build_key(Namespace::ExternalImageLookup, &[hash_string("https://img/a.png")]);
    assert!(key.starts_with("imagery:"));
}

// == Distributed Backend Failure ==

#[tokio::test]
async fn test_unreachable_store_fails_open() {
    let cache = CacheService::new(&BackendConfig::distributed("redis://127.0.0.1:1", "token"))
        .unwrap();
    assert!(cache.is_distributed_backend_active());

    assert_eq!(cache.get::<i32>("weather:19020").await, None);
    assert!(!cache.set("weather:19020", &1, 300).await.unwrap());
    assert!(!cache.delete("weather:19020").await);
    assert!(!cache.invalidate_namespace(Namespace::Weather).await);

    let value: i32 = cache
        .get_or_set("weather:19020", || async { Ok::<_, CacheError>(9) }, 300)
        .await
        .unwrap();
    assert_eq!(value, 9);

    let json = serde_json::to_value(cache.stats().await).unwrap();
    assert_eq!(json["type"], "distributed");
    assert!(json.get("keyCount").is_none());
    assert_eq!(json["perNamespace"]["weather"]["misses"], 2);
}

#[test]
fn test_malformed_store_url_is_rejected() {
    let result = CacheService::new(&BackendConfig::distributed("not a url", "token"));
    assert!(matches!(result, Err(CacheError::Config(_))));
}
