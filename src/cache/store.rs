//! Query Cache Module
//!
//! Main cache engine: fingerprint-keyed entries with request dedup, staleness
//! tracking, background polling, prefix invalidation and LRU/grace-period eviction.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures::FutureExt;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::entry::{AnyData, ApplyOutcome, Fetcher};
use crate::cache::{
    CacheEntry, CacheStats, Fingerprint, LruTracker, QueryOptions, QueryState, QueryStatus,
    RequestId, Subscription,
};
use crate::config::Config;
use crate::error::FetchError;
use crate::invalidation::{InvalidationReport, InvalidationRule};
use crate::tasks::spawn_poll_task;

// == Query Cache ==
/// Shared store of all fetched server data.
///
/// Cloning is cheap and yields another handle to the same store. All state
/// lives behind one mutex that is only held for the synchronous part of each
/// operation, never across an await, so every operation is atomic with
/// respect to every other. Must be used from within a tokio runtime.
#[derive(Debug, Clone)]
pub struct QueryCache {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    state: Mutex<CacheState>,
}

#[derive(Debug)]
struct CacheState {
    entries: HashMap<Fingerprint, CacheEntry>,
    lru: LruTracker,
    stats: CacheStats,
    max_entries: usize,
    gc_time: Duration,
    /// Last generation handed to a newly inserted entry
    last_generation: u64,
}

/// Non-owning handle used by background tasks.
#[derive(Debug, Clone)]
pub(crate) struct WeakQueryCache(Weak<Inner>);

impl WeakQueryCache {
    pub(crate) fn upgrade(&self) -> Option<QueryCache> {
        self.0.upgrade().map(|inner| QueryCache { inner })
    }
}

impl CacheState {
    /// Evicts least recently used idle entries until one more fits.
    fn make_room(&mut self) {
        let mut evicted = 0;
        while self.entries.len() >= self.max_entries {
            let entries = &self.entries;
            let victim = self.lru.evict_oldest_where(|key| {
                entries.get(key).map_or(true, CacheEntry::is_evictable)
            });
            match victim {
                Some(key) => {
                    if let Some(mut entry) = self.entries.remove(&key) {
                        entry.cancel_poll();
                        evicted += 1;
                        debug!(fingerprint = %key, "Evicted least recently used entry");
                    }
                }
                None => {
                    warn!(
                        max_entries = self.max_entries,
                        "Query cache over capacity; every entry is subscribed or loading"
                    );
                    break;
                }
            }
        }
        debug_assert_eq!(self.lru.len(), self.entries.len());
        self.stats.record_evictions(evicted);
    }

    fn remove_entry(&mut self, key: &Fingerprint) -> bool {
        match self.entries.remove(key) {
            Some(mut entry) => {
                entry.cancel_poll();
                self.lru.remove(key);
                debug_assert_eq!(self.lru.len(), self.entries.len());
                self.stats.set_total_entries(self.entries.len());
                true
            }
            None => false,
        }
    }
}

impl QueryCache {
    // == Constructor ==
    /// Creates an empty cache.
    ///
    /// # Arguments
    /// * `max_entries` - Entry count above which idle entries are LRU-evicted
    /// * `gc_time` - Grace period before an unsubscribed entry is swept
    pub fn new(max_entries: usize, gc_time: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(CacheState {
                    entries: HashMap::new(),
                    lru: LruTracker::new(),
                    stats: CacheStats::new(),
                    max_entries,
                    gc_time,
                    last_generation: 0,
                }),
            }),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.max_entries, config.gc_time())
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn downgrade(&self) -> WeakQueryCache {
        WeakQueryCache(Arc::downgrade(&self.inner))
    }

    // == Get ==
    /// Subscribes to `fingerprint`, fetching with `fetcher` when needed.
    ///
    /// Returns immediately with whatever the cache holds. A request is started
    /// when the entry is missing, stale, or older than `options.stale_time`;
    /// a caller arriving while a current request is in flight shares it.
    pub fn get<T, F, Fut>(
        &self,
        fingerprint: Fingerprint,
        fetcher: F,
        options: QueryOptions,
    ) -> Subscription<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let fetcher: Fetcher = Arc::new(move || {
            let request = fetcher();
            async move { request.await.map(|data| Arc::new(data) as AnyData) }.boxed()
        });
        let now = Instant::now();

        let mut guard = self.lock();
        let state = &mut *guard;
        if !state.entries.contains_key(&fingerprint) {
            state.make_room();
            state.last_generation += 1;
        }
        state.lru.touch(&fingerprint);

        let generation = state.last_generation;
        let entry = state
            .entries
            .entry(fingerprint.clone())
            .or_insert_with(|| CacheEntry::new(fingerprint.clone(), generation, now));
        entry.fetcher = Some(fetcher);
        entry.options = options;
        let generation = entry.generation();
        let mut receiver = entry.attach();

        if entry.has_current_request() {
            state.stats.record_dedup_join();
            debug!(fingerprint = %fingerprint, "Joined in-flight request");
        } else if entry.needs_fetch(now) {
            state.stats.record_miss();
            self.spawn_fetch(entry, &mut state.stats);
        } else {
            state.stats.record_hit();
        }

        if let Some(interval) = options.refetch_interval {
            if entry.poll_task.is_none() {
                entry.poll_task = Some(spawn_poll_task(
                    self.downgrade(),
                    fingerprint.clone(),
                    interval,
                ));
            }
        }
        state.stats.set_total_entries(state.entries.len());
        // The subscriber starts from the state above, including a fetch just started.
        receiver.borrow_and_update();
        drop(guard);

        Subscription::new(self.clone(), fingerprint, generation, receiver)
    }

    // == Fetch Lifecycle ==
    /// Issues a request for `entry` and schedules its completion.
    fn spawn_fetch(&self, entry: &mut CacheEntry, stats: &mut CacheStats) -> Option<RequestId> {
        let fetcher = entry.fetcher.clone()?;
        let id = entry.begin_request();
        stats.record_fetch();

        let key = entry.key().clone();
        let generation = entry.generation();
        debug!(fingerprint = %key, request_id = id, "Starting fetch");
        let request = fetcher();
        let cache = self.downgrade();
        tokio::spawn(async move {
            let result = request.await;
            if let Some(cache) = cache.upgrade() {
                cache.complete(&key, generation, id, result);
            }
        });
        Some(id)
    }

    fn complete(
        &self,
        key: &Fingerprint,
        generation: u64,
        id: RequestId,
        result: Result<AnyData, FetchError>,
    ) {
        let failure = result.as_ref().err().cloned();
        let mut guard = self.lock();
        let state = &mut *guard;
        let Some(entry) = state
            .entries
            .get_mut(key)
            .filter(|entry| entry.generation() == generation)
        else {
            debug!(fingerprint = %key, request_id = id, "Entry evicted before response arrived");
            return;
        };

        match entry.apply_response(id, result, Instant::now()) {
            ApplyOutcome::Applied => {
                debug!(fingerprint = %key, request_id = id, status = ?entry.status(), "Fetch completed");
            }
            ApplyOutcome::Failed => {
                state.stats.record_failure();
                if let Some(err) = failure {
                    warn!(fingerprint = %key, request_id = id, error = %err, "Fetch failed");
                }
            }
            ApplyOutcome::Discarded => {
                state.stats.record_discard();
                debug!(fingerprint = %key, request_id = id, "Discarded superseded response");
            }
        }
    }

    // == Refetch ==
    /// Manually refetches a cached query.
    ///
    /// Returns false when a current request is already in flight (it is
    /// shared instead) or the fingerprint is unknown.
    pub fn refetch(&self, fingerprint: &Fingerprint) -> bool {
        let mut guard = self.lock();
        let state = &mut *guard;
        let Some(entry) = state.entries.get_mut(fingerprint) else {
            return false;
        };
        if entry.has_current_request() {
            state.stats.record_dedup_join();
            return false;
        }
        self.spawn_fetch(entry, &mut state.stats).is_some()
    }

    /// One poll tick. A no-op while a current request is in flight.
    pub(crate) fn poll_tick(&self, fingerprint: &Fingerprint) -> bool {
        let mut guard = self.lock();
        let state = &mut *guard;
        let Some(entry) = state.entries.get_mut(fingerprint) else {
            return false;
        };
        if entry.subscribers() == 0 {
            return false;
        }
        if entry.has_current_request() {
            debug!(fingerprint = %fingerprint, "Poll tick skipped; request in flight");
            return false;
        }
        self.spawn_fetch(entry, &mut state.stats).is_some()
    }

    // == Focus Revalidation ==
    /// Revalidates every subscribed entry that is stale, as an immediate poll tick.
    ///
    /// Returns the number of requests started.
    pub fn focus(&self) -> usize {
        let now = Instant::now();
        let mut guard = self.lock();
        let state = &mut *guard;
        let mut started = 0;
        for entry in state.entries.values_mut() {
            if entry.subscribers() > 0
                && !entry.has_current_request()
                && entry.needs_fetch(now)
                && self.spawn_fetch(entry, &mut state.stats).is_some()
            {
                started += 1;
            }
        }
        debug!(started, "Focus revalidation");
        started
    }

    // == Invalidate ==
    /// Marks every entry matching any rule stale, then refetches the visible
    /// ones whose matching rules ask for it.
    ///
    /// Runs under a single lock acquisition, so no concurrent `get` observes
    /// a partially applied invalidation.
    pub fn invalidate(&self, rules: &[InvalidationRule]) -> InvalidationReport {
        let mut guard = self.lock();
        let state = &mut *guard;

        let mut to_refetch = Vec::new();
        let mut report = InvalidationReport::default();
        for (key, entry) in state.entries.iter_mut() {
            let mut matched = false;
            let mut refetch = false;
            for rule in rules.iter().filter(|rule| key.matches_prefix(&rule.prefix)) {
                matched = true;
                refetch |= rule.scope.refetches_visible();
            }
            if !matched {
                continue;
            }
            entry.mark_stale();
            report.marked += 1;
            if refetch && entry.subscribers() > 0 {
                to_refetch.push(key.clone());
            }
        }

        for key in &to_refetch {
            if let Some(entry) = state.entries.get_mut(key) {
                if self.spawn_fetch(entry, &mut state.stats).is_some() {
                    report.refetched += 1;
                }
            }
        }
        state.stats.record_invalidations(report.marked);

        info!(
            rules = rules.len(),
            marked = report.marked,
            refetched = report.refetched,
            "Invalidation applied"
        );
        report
    }

    // == Subscribers ==
    /// Releases one subscriber of the entry created as `generation`.
    ///
    /// A no-op when that entry is gone, even if a newer entry now holds the key.
    pub(crate) fn detach(&self, fingerprint: &Fingerprint, generation: u64) {
        let mut guard = self.lock();
        if let Some(entry) = guard.entries.get_mut(fingerprint) {
            if entry.generation() != generation {
                debug!(fingerprint = %fingerprint, "Ignoring detach from a removed entry");
                return;
            }
            if entry.detach(Instant::now()) {
                debug!(fingerprint = %fingerprint, "Last subscriber detached");
            }
        }
    }

    pub fn subscriber_count(&self, fingerprint: &Fingerprint) -> usize {
        self.lock()
            .entries
            .get(fingerprint)
            .map_or(0, CacheEntry::subscribers)
    }

    // == Inspection ==
    /// Reads an entry without subscribing or triggering a fetch.
    pub fn peek<T: Send + Sync + 'static>(&self, fingerprint: &Fingerprint) -> Option<QueryState<T>> {
        self.lock()
            .entries
            .get(fingerprint)
            .map(|entry| QueryState::from_snapshot(&entry.snapshot()))
    }

    pub fn status(&self, fingerprint: &Fingerprint) -> Option<QueryStatus> {
        self.lock().entries.get(fingerprint).map(CacheEntry::status)
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.lock().entries.contains_key(fingerprint)
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        let mut stats = state.stats.clone();
        stats.set_total_entries(state.entries.len());
        stats
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    // == Eviction ==
    /// Removes entries that have had no subscribers for longer than the grace period.
    ///
    /// Returns the number of entries removed.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let mut guard = self.lock();
        let state = &mut *guard;
        let gc_time = state.gc_time;
        let expired: Vec<Fingerprint> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now, gc_time))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            state.remove_entry(key);
        }
        state.stats.record_evictions(expired.len());
        expired.len()
    }

    /// Explicitly removes an entry. Existing subscriptions stop receiving updates.
    pub fn remove(&self, fingerprint: &Fingerprint) -> bool {
        self.lock().remove_entry(fingerprint)
    }

    // == Shutdown ==
    /// Cancels every poll timer and drops all entries.
    pub fn shutdown(&self) {
        let mut guard = self.lock();
        let state = &mut *guard;
        for entry in state.entries.values_mut() {
            entry.cancel_poll();
        }
        let dropped = state.entries.len();
        state.entries.clear();
        state.lru.clear();
        state.stats.set_total_entries(0);
        info!(dropped, "Query cache shut down");
    }
}
