//! Eviction Task
//!
//! Background task that periodically sweeps entries nobody has subscribed to
//! for longer than the cache's grace period.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::QueryCache;

/// Spawns a background task that periodically evicts expired cache entries.
///
/// The task holds only a weak handle and exits on its own once every
/// `QueryCache` handle is dropped.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cache = QueryCache::new(500, Duration::from_secs(300));
/// let eviction_handle = spawn_eviction_task(&cache, Duration::from_secs(60));
/// // Later, during shutdown:
/// eviction_handle.abort();
/// ```
pub fn spawn_eviction_task(cache: &QueryCache, interval: Duration) -> JoinHandle<()> {
    let cache = cache.downgrade();

    tokio::spawn(async move {
        info!(
            "Starting eviction task with interval of {} ms",
            interval.as_millis()
        );

        loop {
            tokio::time::sleep(interval).await;

            let Some(cache) = cache.upgrade() else {
                debug!("Query cache dropped; eviction task exiting");
                break;
            };
            let removed = cache.evict_expired();

            if removed > 0 {
                info!("Eviction sweep: removed {} idle entries", removed);
            } else {
                debug!("Eviction sweep: no idle entries past the grace period");
            }
        }
    })
}
