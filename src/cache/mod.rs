//! Cache Module
//!
//! Namespaced cache facade: key building, namespace table, hit/miss stats,
//! and the [`CacheService`] that ties them to a storage backend.

mod entry;
mod key;
mod namespace;
mod service;
mod stats;


// Re-export public types
pub use entry::{CacheEntry, Clock, ManualClock, SystemClock};
pub use key::{build_key, hash_string, KEY_DELIMITER};
pub use namespace::{Namespace, NamespaceInfo};
pub use service::{default_ttl_for, CacheService, FALLBACK_TTL_SECONDS};
pub use stats::{hit_rate, StatView, StatsSnapshot, StatsTracker};
