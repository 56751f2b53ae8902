//! Subscription Module
//!
//! Typed, live views onto one cache entry.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::cache::entry::EntrySnapshot;
use crate::cache::{Fingerprint, QueryCache, QueryStatus};
use crate::error::FetchError;

// == Query State ==
/// What a view sees of a cached query at one point in time.
#[derive(Debug)]
pub struct QueryState<T> {
    pub status: QueryStatus,
    /// Last successfully fetched data, kept across later failures
    pub data: Option<Arc<T>>,
    pub error: Option<FetchError>,
    /// Wall-clock time of the last successful fetch
    pub fetched_at: Option<DateTime<Utc>>,
    /// True while any request for this key is in flight
    pub is_fetching: bool,
}

impl<T: Send + Sync + 'static> QueryState<T> {
    pub(crate) fn from_snapshot(snapshot: &EntrySnapshot) -> Self {
        Self {
            status: snapshot.status,
            data: snapshot
                .data
                .clone()
                .and_then(|data| data.downcast::<T>().ok()),
            error: snapshot.error.clone(),
            fetched_at: snapshot.fetched_at,
            is_fetching: snapshot.is_fetching,
        }
    }
}

impl<T> QueryState<T> {
    /// First load: nothing to show yet.
    pub fn is_loading(&self) -> bool {
        self.data.is_none() && self.is_fetching
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }
}

impl<T> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            fetched_at: self.fetched_at,
            is_fetching: self.is_fetching,
        }
    }
}

// == Subscription ==
/// A live registration against one fingerprint.
///
/// Dropping the subscription detaches it; the last detach cancels polling.
pub struct Subscription<T> {
    cache: QueryCache,
    fingerprint: Fingerprint,
    generation: u64,
    receiver: watch::Receiver<EntrySnapshot>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Subscription<T> {
    pub(crate) fn new(
        cache: QueryCache,
        fingerprint: Fingerprint,
        generation: u64,
        receiver: watch::Receiver<EntrySnapshot>,
    ) -> Self {
        Self {
            cache,
            fingerprint,
            generation,
            receiver,
            _marker: PhantomData,
        }
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Current state, without waiting.
    pub fn state(&self) -> QueryState<T> {
        QueryState::from_snapshot(&self.receiver.borrow())
    }

    /// Waits for the next state change.
    ///
    /// Changes made in quick succession are coalesced into the latest one.
    /// Returns `None` once the entry is gone (removed or cache shut down) and
    /// every change made before that has been delivered.
    pub async fn changed(&mut self) -> Option<QueryState<T>> {
        self.receiver.changed().await.ok()?;
        let snapshot = self.receiver.borrow_and_update();
        Some(QueryState::from_snapshot(&snapshot))
    }

    /// Waits until the state satisfies `predicate`, checking the current state first.
    pub async fn wait_until<P>(&mut self, mut predicate: P) -> Option<QueryState<T>>
    where
        P: FnMut(&QueryState<T>) -> bool,
    {
        let snapshot = self
            .receiver
            .wait_for(|snapshot| predicate(&QueryState::from_snapshot(snapshot)))
            .await
            .ok()?;
        Some(QueryState::from_snapshot(&snapshot))
    }

    /// Manually refetches; shares a request already in flight.
    pub fn refetch(&self) -> bool {
        self.cache.refetch(&self.fingerprint)
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.cache.detach(&self.fingerprint, self.generation);
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("fingerprint", &self.fingerprint)
            .field("status", &self.receiver.borrow().status)
            .finish()
    }
}
