//! Cache Entry Module
//!
//! Per-fingerprint state: data, status, request sequencing and subscriber bookkeeping.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::cache::Fingerprint;
use crate::error::FetchError;

/// Monotonically increasing per-fingerprint request sequence number.
pub type RequestId = u64;

pub(crate) type AnyData = Arc<dyn Any + Send + Sync>;
pub(crate) type Fetcher =
    Arc<dyn Fn() -> BoxFuture<'static, Result<AnyData, FetchError>> + Send + Sync>;

// == Query Status ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Never fetched
    Idle,
    /// A request is in flight
    Loading,
    /// Last request succeeded and has not been invalidated
    Fresh,
    /// Invalidated; refetch on next access
    Stale,
    /// Last request failed; previous data (if any) is kept
    Error,
}

// == Query Options ==
/// Per-subscription fetch policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// Age after which cached data is refetched on access
    pub stale_time: Duration,
    /// Background refetch period while subscribed
    pub refetch_interval: Option<Duration>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            stale_time: Duration::ZERO,
            refetch_interval: None,
        }
    }
}

impl QueryOptions {
    #[must_use]
    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    #[must_use]
    pub fn refetch_interval(mut self, interval: Duration) -> Self {
        self.refetch_interval = Some(interval);
        self
    }
}

// == Entry Snapshot ==
/// Type-erased view of an entry, broadcast to subscribers on every change.
#[derive(Clone)]
pub(crate) struct EntrySnapshot {
    pub status: QueryStatus,
    pub data: Option<AnyData>,
    pub error: Option<FetchError>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub is_fetching: bool,
}

/// Result of applying a completed request to an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ApplyOutcome {
    Applied,
    Failed,
    /// A newer response was already applied
    Discarded,
}

// == Cache Entry ==
/// A single cached query. Only the owning `QueryCache` mutates it.
pub struct CacheEntry {
    key: Fingerprint,
    /// Distinguishes this entry from earlier ones stored under the same key
    generation: u64,
    status: QueryStatus,
    data: Option<AnyData>,
    error: Option<FetchError>,
    /// Logical time of the last successful response
    last_fetched_at: Option<Instant>,
    /// Wall-clock time of the last successful response
    fetched_at: Option<DateTime<Utc>>,
    in_flight: Option<RequestId>,
    last_started: RequestId,
    last_applied: RequestId,
    /// Responses to requests up to this id predate an invalidation
    stale_through: RequestId,
    subscribers: usize,
    unsubscribed_since: Option<Instant>,
    pub(crate) options: QueryOptions,
    pub(crate) fetcher: Option<Fetcher>,
    pub(crate) poll_task: Option<JoinHandle<()>>,
    notifier: watch::Sender<EntrySnapshot>,
}

impl CacheEntry {
    // == Constructor ==
    pub(crate) fn new(key: Fingerprint, generation: u64, now: Instant) -> Self {
        let (notifier, _) = watch::channel(EntrySnapshot {
            status: QueryStatus::Idle,
            data: None,
            error: None,
            fetched_at: None,
            is_fetching: false,
        });
        Self {
            key,
            generation,
            status: QueryStatus::Idle,
            data: None,
            error: None,
            last_fetched_at: None,
            fetched_at: None,
            in_flight: None,
            last_started: 0,
            last_applied: 0,
            stale_through: 0,
            subscribers: 0,
            unsubscribed_since: Some(now),
            options: QueryOptions::default(),
            fetcher: None,
            poll_task: None,
            notifier,
        }
    }

    pub fn key(&self) -> &Fingerprint {
        &self.key
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn status(&self) -> QueryStatus {
        self.status
    }

    pub fn subscribers(&self) -> usize {
        self.subscribers
    }

    pub fn in_flight(&self) -> Option<RequestId> {
        self.in_flight
    }

    // == Staleness ==
    /// Returns true if an access at `now` should trigger a fetch.
    pub fn needs_fetch(&self, now: Instant) -> bool {
        match self.status {
            QueryStatus::Idle | QueryStatus::Stale => true,
            _ => match self.last_fetched_at {
                Some(fetched) => now.saturating_duration_since(fetched) >= self.options.stale_time,
                None => true,
            },
        }
    }

    /// Returns true if the in-flight request was started after the last invalidation.
    ///
    /// Only such a request may absorb new callers; an older one would deliver
    /// pre-invalidation data.
    pub fn has_current_request(&self) -> bool {
        self.in_flight.is_some_and(|id| id > self.stale_through)
    }

    /// Entries with subscribers or a pending request are never evicted.
    pub fn is_evictable(&self) -> bool {
        self.subscribers == 0 && self.in_flight.is_none()
    }

    /// Returns true if unsubscribed for at least `grace` at `now`.
    pub fn is_expired(&self, now: Instant, grace: Duration) -> bool {
        self.subscribers == 0
            && self
                .unsubscribed_since
                .is_some_and(|since| now.saturating_duration_since(since) >= grace)
    }

    // == Subscribers ==
    pub(crate) fn attach(&mut self) -> watch::Receiver<EntrySnapshot> {
        self.subscribers += 1;
        self.unsubscribed_since = None;
        self.notifier.subscribe()
    }

    /// Returns true when the last subscriber left.
    pub(crate) fn detach(&mut self, now: Instant) -> bool {
        self.subscribers = self.subscribers.saturating_sub(1);
        if self.subscribers == 0 {
            self.unsubscribed_since = Some(now);
            if let Some(task) = self.poll_task.take() {
                task.abort();
            }
            return true;
        }
        false
    }

    // == Request Lifecycle ==
    /// Allocates the next request id and moves the entry to `Loading`.
    pub(crate) fn begin_request(&mut self) -> RequestId {
        self.last_started += 1;
        self.in_flight = Some(self.last_started);
        self.status = QueryStatus::Loading;
        self.publish();
        self.last_started
    }

    /// Applies a completed request.
    ///
    /// Responses are applied in completion order unless a newer request
    /// already completed, in which case the older response is dropped.
    pub(crate) fn apply_response(
        &mut self,
        id: RequestId,
        result: Result<AnyData, FetchError>,
        now: Instant,
    ) -> ApplyOutcome {
        if id <= self.last_applied {
            return ApplyOutcome::Discarded;
        }
        self.last_applied = id;
        if self.in_flight == Some(id) {
            self.in_flight = None;
        }

        let outcome = match result {
            Ok(data) => {
                self.data = Some(data);
                self.error = None;
                self.last_fetched_at = Some(now);
                self.fetched_at = Some(Utc::now());
                self.status = if id <= self.stale_through {
                    QueryStatus::Stale
                } else {
                    QueryStatus::Fresh
                };
                ApplyOutcome::Applied
            }
            Err(err) => {
                self.error = Some(err);
                self.status = QueryStatus::Error;
                ApplyOutcome::Failed
            }
        };

        // A newer request is still pending
        if self.in_flight.is_some() {
            self.status = QueryStatus::Loading;
        }
        self.publish();
        outcome
    }

    /// Marks the entry stale, including any response still in flight.
    pub(crate) fn mark_stale(&mut self) {
        self.stale_through = self.last_started;
        self.status = QueryStatus::Stale;
        self.publish();
    }

    pub(crate) fn cancel_poll(&mut self) {
        if let Some(task) = self.poll_task.take() {
            task.abort();
        }
    }

    // == Notification ==
    pub(crate) fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            fetched_at: self.fetched_at,
            is_fetching: self.in_flight.is_some(),
        }
    }

    fn publish(&self) {
        self.notifier.send_replace(self.snapshot());
    }
}

impl fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("key", &self.key)
            .field("generation", &self.generation)
            .field("status", &self.status)
            .field("has_data", &self.data.is_some())
            .field("error", &self.error)
            .field("in_flight", &self.in_flight)
            .field("subscribers", &self.subscribers)
            .finish()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> CacheEntry {
        CacheEntry::new(Fingerprint::from_raw("features/list"), 1, Instant::now())
    }

    fn data(value: &str) -> AnyData {
        Arc::new(value.to_string())
    }

    #[test]
    fn test_new_entry_is_idle_and_needs_fetch() {
        let entry = entry();
        assert_eq!(entry.status(), QueryStatus::Idle);
        assert!(entry.needs_fetch(Instant::now()));
        assert!(entry.is_evictable());
    }

    #[test]
    fn test_success_marks_fresh() {
        let mut entry = entry();
        entry.options = QueryOptions::default().stale_time(Duration::from_secs(60));
        let id = entry.begin_request();
        assert_eq!(entry.status(), QueryStatus::Loading);

        let now = Instant::now();
        assert_eq!(entry.apply_response(id, Ok(data("a")), now), ApplyOutcome::Applied);
        assert_eq!(entry.status(), QueryStatus::Fresh);
        assert!(entry.in_flight().is_none());
        assert!(!entry.needs_fetch(now));
        assert!(entry.needs_fetch(now + Duration::from_secs(60)));
    }

    #[test]
    fn test_failure_keeps_previous_data() {
        let mut entry = entry();
        let first = entry.begin_request();
        entry.apply_response(first, Ok(data("good")), Instant::now());

        let second = entry.begin_request();
        let outcome = entry.apply_response(
            second,
            Err(FetchError::Network("offline".to_string())),
            Instant::now(),
        );
        assert_eq!(outcome, ApplyOutcome::Failed);

        let snapshot = entry.snapshot();
        assert_eq!(snapshot.status, QueryStatus::Error);
        assert!(snapshot.error.is_some());
        let kept = snapshot.data.unwrap().downcast::<String>().unwrap();
        assert_eq!(kept.as_str(), "good");
    }

    #[test]
    fn test_older_response_after_newer_is_discarded() {
        let mut entry = entry();
        let older = entry.begin_request();
        let newer = entry.begin_request();

        entry.apply_response(newer, Ok(data("new")), Instant::now());
        let outcome = entry.apply_response(older, Ok(data("old")), Instant::now());

        assert_eq!(outcome, ApplyOutcome::Discarded);
        let kept = entry.snapshot().data.unwrap().downcast::<String>().unwrap();
        assert_eq!(kept.as_str(), "new");
    }

    #[test]
    fn test_older_response_first_keeps_loading() {
        let mut entry = entry();
        let older = entry.begin_request();
        let _newer = entry.begin_request();

        entry.apply_response(older, Ok(data("old")), Instant::now());
        assert_eq!(entry.status(), QueryStatus::Loading);
        assert!(entry.snapshot().is_fetching);
    }

    #[test]
    fn test_invalidated_in_flight_response_lands_stale() {
        let mut entry = entry();
        let id = entry.begin_request();
        entry.mark_stale();
        assert!(!entry.has_current_request());

        entry.apply_response(id, Ok(data("pre-mutation")), Instant::now());
        assert_eq!(entry.status(), QueryStatus::Stale);
        assert!(entry.needs_fetch(Instant::now()));
    }

    #[test]
    fn test_detach_tracks_unsubscribed_time() {
        let mut entry = entry();
        let _rx = entry.attach();
        let _rx2 = entry.attach();
        let now = Instant::now();

        assert!(!entry.detach(now));
        assert!(!entry.is_expired(now, Duration::ZERO));
        assert!(entry.detach(now));
        assert!(entry.is_expired(now + Duration::from_secs(5), Duration::from_secs(5)));
        assert!(!entry.is_expired(now + Duration::from_secs(4), Duration::from_secs(5)));
    }
}
