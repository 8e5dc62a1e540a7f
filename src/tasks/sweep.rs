//! Expiry Sweep Task
//!
//! Periodically drops expired entries from the in-process backend so that
//! keys nobody reads again do not accumulate. Reads still check expiry on
//! their own; the sweep only reclaims memory.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CacheService;

/// Spawns a background task that purges expired entries every
/// `interval_secs` seconds.
///
/// # Returns
/// A JoinHandle for the spawned task, aborted by the server on shutdown.
///
/// # Example
/// ```ignore
/// let cache = CacheService::local();
/// let sweep_handle = spawn_sweep_task(cache.clone(), 60);
/// // Later, during shutdown:
/// sweep_handle.abort();
/// ```
pub fn spawn_sweep_task(cache: CacheService, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting expiry sweep task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.purge_expired().await;
            if removed > 0 {
                info!("Expiry sweep: removed {} expired entries", removed);
            } else {
                debug!("Expiry sweep: no expired entries found");
            }
        }
    })
}
