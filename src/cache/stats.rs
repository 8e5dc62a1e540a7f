//! Cache Statistics Module
//!
//! Hit/miss counters kept globally and per namespace. Purely observational:
//! per process, never persisted, mutated only by reads.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use super::namespace::Namespace;
use crate::backend::BackendKind;

// == Stat Entry ==
/// Hit and miss counters for one scope.
#[derive(Debug, Default)]
pub struct StatEntry {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl StatEntry {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    fn view(&self, last_reset_at: DateTime<Utc>) -> StatView {
        StatView::new(
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            last_reset_at,
        )
    }
}

// == Stat View ==
/// Point-in-time copy of a [`StatEntry`] with its derived hit rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatView {
    pub hits: u64,
    pub misses: u64,
    /// Whole-number percentage, 0 when there have been no reads
    pub hit_rate: u64,
    pub last_reset_at: DateTime<Utc>,
}

impl StatView {
    pub fn new(hits: u64, misses: u64, last_reset_at: DateTime<Utc>) -> Self {
        Self {
            hits,
            misses,
            hit_rate: hit_rate(hits, misses),
            last_reset_at,
        }
    }
}

/// `round(hits / (hits + misses) * 100)`, or 0 with no requests.
pub fn hit_rate(hits: u64, misses: u64) -> u64 {
    let total = hits + misses;
    if total == 0 {
        0
    } else {
        (hits as f64 / total as f64 * 100.0).round() as u64
    }
}

// == Stats Snapshot ==
/// Observability snapshot returned by `CacheService::stats`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    #[serde(rename = "type")]
    pub backend: BackendKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_count: Option<usize>,
    pub global: StatView,
    pub per_namespace: BTreeMap<Namespace, StatView>,
}

// == Stats Tracker ==
/// Concurrent hit/miss tracker.
#[derive(Debug)]
pub struct StatsTracker {
    global: StatEntry,
    namespaces: [StatEntry; Namespace::ALL.len()],
    last_reset_ms: AtomicI64,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self {
            global: StatEntry::default(),
            namespaces: Default::default(),
            last_reset_ms: AtomicI64::new(Utc::now().timestamp_millis()),
        }
    }

    /// Counts a hit globally and, when resolved, against the namespace.
    pub fn record_hit(&self, namespace: Option<Namespace>) {
        self.global.record_hit();
        if let Some(ns) = namespace {
            self.namespaces[ns.index()].record_hit();
        }
    }

    /// Counts a miss globally and, when resolved, against the namespace.
    pub fn record_miss(&self, namespace: Option<Namespace>) {
        self.global.record_miss();
        if let Some(ns) = namespace {
            self.namespaces[ns.index()].record_miss();
        }
    }

    /// Current counters for the global scope.
    pub fn global(&self) -> StatView {
        self.global.view(self.last_reset_at())
    }

    /// Current counters for one namespace.
    pub fn namespace(&self, namespace: Namespace) -> StatView {
        self.namespaces[namespace.index()].view(self.last_reset_at())
    }

    /// Every namespace's counters, zeros included.
    pub fn per_namespace(&self) -> BTreeMap<Namespace, StatView> {
        Namespace::ALL
            .into_iter()
            .map(|ns| (ns, self.namespace(ns)))
            .collect()
    }

    // == Reset ==
    /// Clears all counters and stamps the reset time.
    pub fn reset(&self) {
        self.global.reset();
        for entry in &self.namespaces {
            entry.reset();
        }
        self.last_reset_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn last_reset_at(&self) -> DateTime<Utc> {
        let ms = self.last_reset_ms.load(Ordering::Relaxed);
        Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now)
    }
}

impl Default for StatsTracker {
    fn default() -> Self {
        Self::new()
    }
}
