//! Poll Task
//!
//! Per-fingerprint background refetch while a query has subscribers.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::{Fingerprint, WeakQueryCache};

/// Spawns the refetch timer for one fingerprint.
///
/// The cache aborts the returned handle when the last subscriber detaches.
/// Each tick is a no-op while a request for the key is already in flight.
pub(crate) fn spawn_poll_task(
    cache: WeakQueryCache,
    fingerprint: Fingerprint,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!(fingerprint = %fingerprint, interval_ms = interval.as_millis() as u64, "Polling started");
        loop {
            tokio::time::sleep(interval).await;

            let Some(cache) = cache.upgrade() else {
                break;
            };
            if cache.poll_tick(&fingerprint) {
                debug!(fingerprint = %fingerprint, "Poll refetch");
            }
        }
    })
}
