//! Cache Statistics Module
//!
//! Tracks how the query cache served its subscribers.

use serde::Serialize;

// == Cache Stats ==
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Subscriptions served from fresh data without a request
    pub hits: u64,
    /// Subscriptions that had to start a request
    pub misses: u64,
    /// Subscriptions that attached to a request already in flight
    pub dedup_joins: u64,
    /// Requests started for any reason
    pub fetches: u64,
    /// Requests that completed with an error
    pub failures: u64,
    /// Responses dropped because a newer one was already applied
    pub discarded: u64,
    /// Entries marked stale by invalidation
    pub invalidations: u64,
    /// Entries removed by capacity pressure or the grace-period sweep
    pub evictions: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Share of subscriptions that did not start a request.
    ///
    /// Dedup joins count as hits. Returns 0.0 if nothing subscribed yet.
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.dedup_joins;
        let total = served + self.misses;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_dedup_join(&mut self) {
        self.dedup_joins += 1;
    }

    pub fn record_fetch(&mut self) {
        self.fetches += 1;
    }

    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    pub fn record_discard(&mut self) {
        self.discarded += 1;
    }

    pub fn record_invalidations(&mut self, count: usize) {
        self.invalidations += count as u64;
    }

    pub fn record_evictions(&mut self, count: usize) {
        self.evictions += count as u64;
    }

    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}
