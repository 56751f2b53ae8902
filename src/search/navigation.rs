//! Navigation State
//!
//! Key-value view of the address bar query string, plus an in-memory
//! implementation with a history stack.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use url::Url;

use crate::error::{Result, SyncError};

/// Capacity of the external-change channel
const EVENT_CAPACITY: usize = 16;

// == Navigation Event ==
/// A location change that did not originate from a `set`/`delete`/`replace` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationEvent {
    Back,
    Forward,
    /// A link or typed address landed on a new location
    Navigate,
}

// == Navigation State ==
/// Persisted, navigable key-value state.
///
/// Writes use history-replace semantics and never emit a `NavigationEvent`;
/// only external navigation does.
pub trait NavigationState: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) {
        self.replace(&[(key, Some(value))]);
    }

    fn delete(&self, key: &str) {
        self.replace(&[(key, None)]);
    }

    /// Applies several changes as one history replace. `None` removes the key.
    fn replace(&self, changes: &[(&str, Option<&str>)]);

    /// Subscribes to external navigation (back/forward, landing links).
    fn subscribe(&self) -> broadcast::Receiver<NavigationEvent>;
}

// == Memory Navigation ==
#[derive(Debug)]
struct History {
    entries: Vec<Url>,
    index: usize,
    writes: usize,
}

impl History {
    fn current(&self) -> &Url {
        &self.entries[self.index]
    }

    fn current_mut(&mut self) -> &mut Url {
        &mut self.entries[self.index]
    }
}

/// In-process `NavigationState` backed by a URL history stack.
#[derive(Debug)]
pub struct MemoryNavigation {
    history: Mutex<History>,
    events: broadcast::Sender<NavigationEvent>,
}

impl MemoryNavigation {
    /// Starts a history at `initial`, which must be an absolute URL.
    pub fn new(initial: &str) -> Result<Self> {
        let url = parse_url(initial)?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            history: Mutex::new(History {
                entries: vec![url],
                index: 0,
                writes: 0,
            }),
            events,
        })
    }

    fn lock(&self) -> MutexGuard<'_, History> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: NavigationEvent) {
        // No listeners is fine
        let _ = self.events.send(event);
    }

    /// Pushes a new location, dropping any forward history.
    pub fn navigate(&self, url: &str) -> Result<()> {
        let url = parse_url(url)?;
        {
            let mut history = self.lock();
            let next = history.index + 1;
            history.entries.truncate(next);
            history.entries.push(url);
            history.index = next;
        }
        self.emit(NavigationEvent::Navigate);
        Ok(())
    }

    /// Steps back one entry. Returns false at the start of history.
    pub fn back(&self) -> bool {
        {
            let mut history = self.lock();
            if history.index == 0 {
                return false;
            }
            history.index -= 1;
        }
        self.emit(NavigationEvent::Back);
        true
    }

    /// Steps forward one entry. Returns false at the end of history.
    pub fn forward(&self) -> bool {
        {
            let mut history = self.lock();
            if history.index + 1 >= history.entries.len() {
                return false;
            }
            history.index += 1;
        }
        self.emit(NavigationEvent::Forward);
        true
    }

    pub fn current_url(&self) -> String {
        self.lock().current().to_string()
    }

    /// Number of history-replace writes so far.
    pub fn writes(&self) -> usize {
        self.lock().writes
    }

    pub fn history_len(&self) -> usize {
        self.lock().entries.len()
    }
}

impl NavigationState for MemoryNavigation {
    fn get(&self, key: &str) -> Option<String> {
        self.lock()
            .current()
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    fn replace(&self, changes: &[(&str, Option<&str>)]) {
        let mut history = self.lock();
        let url = history.current_mut();

        let mut pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        for (key, value) in changes {
            match value {
                Some(value) => match pairs.iter_mut().find(|(k, _)| k == key) {
                    Some(pair) => pair.1 = value.to_string(),
                    None => pairs.push((key.to_string(), value.to_string())),
                },
                None => pairs.retain(|(k, _)| k != key),
            }
        }

        if pairs.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(pairs);
        }
        history.writes += 1;
    }

    fn subscribe(&self) -> broadcast::Receiver<NavigationEvent> {
        self.events.subscribe()
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|err| SyncError::InvalidRequest(format!("Invalid URL `{raw}`: {err}")))
}
