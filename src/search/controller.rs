//! Search Sync Controller
//!
//! Keeps one search field in sync with navigation state: keystrokes are
//! echoed immediately and committed after a quiet period; external navigation
//! re-hydrates the field without writing back.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::search::NavigationState;

/// Navigation key holding the committed search text
pub const SEARCH_KEY: &str = "search";

/// Navigation key holding the current page
pub const PAGE_KEY: &str = "page";

/// Value `PAGE_KEY` is reset to on every commit
pub const FIRST_PAGE: &str = "1";

/// Reference debounce delay
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

// == Debounce Phase ==
/// Idle → Pending → Committed, with cancellation back to Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebouncePhase {
    /// Nothing pending since the last re-hydration or start
    Idle,
    /// A commit is scheduled; only the timer of this generation may fire it
    Pending { generation: u64 },
    /// The last pending value has been written
    Committed,
}

#[derive(Debug)]
struct SearchState {
    raw_input: String,
    committed_value: String,
    phase: DebouncePhase,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

impl SearchState {
    /// Invalidates any scheduled commit. Returns true if one was pending.
    fn cancel_pending(&mut self) -> bool {
        self.generation += 1;
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        let was_pending = matches!(self.phase, DebouncePhase::Pending { .. });
        if was_pending {
            self.phase = DebouncePhase::Idle;
        }
        was_pending
    }
}

struct Shared {
    navigation: Arc<dyn NavigationState>,
    delay: Duration,
    state: Mutex<SearchState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SearchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Writes the trimmed input and resets pagination in one history replace.
    fn commit(&self, state: &mut SearchState) {
        let value = state.raw_input.trim().to_string();
        state.committed_value = value.clone();
        state.phase = DebouncePhase::Committed;
        state.timer = None;

        let current = self.navigation.get(SEARCH_KEY).unwrap_or_default();
        if current == value {
            self.navigation.set(PAGE_KEY, FIRST_PAGE);
            debug!(search = %value, "Search unchanged; page reset only");
            return;
        }

        let search = (!value.is_empty()).then_some(value.as_str());
        self.navigation
            .replace(&[(SEARCH_KEY, search), (PAGE_KEY, Some(FIRST_PAGE))]);
        info!(search = %value, "Search committed to navigation state");
    }

    /// Fires when a debounce timer elapses.
    fn expire(&self, generation: u64) {
        let mut state = self.lock();
        if state.phase != (DebouncePhase::Pending { generation }) {
            debug!(generation, "Ignoring cancelled debounce timer");
            return;
        }
        self.commit(&mut state);
    }

    /// Copies the navigation value into the field without writing back.
    fn rehydrate(&self) {
        let mut state = self.lock();
        if state.cancel_pending() {
            debug!("External navigation cancelled a pending search commit");
        }
        state.raw_input = self.navigation.get(SEARCH_KEY).unwrap_or_default();
        debug!(search = %state.raw_input, "Search re-hydrated from navigation");
    }
}

// == Search Sync Controller ==
/// Debounced, loop-free binding between a text field and navigation state.
///
/// Only user-originated calls (`input`, `clear`, `flush`) ever write
/// navigation state.
pub struct SearchSyncController {
    shared: Arc<Shared>,
    listener: JoinHandle<()>,
}

impl SearchSyncController {
    /// Creates a controller seeded from the current navigation state.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(navigation: Arc<dyn NavigationState>, delay: Duration) -> Self {
        let initial = navigation.get(SEARCH_KEY).unwrap_or_default();
        let mut events = navigation.subscribe();
        let shared = Arc::new(Shared {
            navigation,
            delay,
            state: Mutex::new(SearchState {
                raw_input: initial.clone(),
                committed_value: initial,
                phase: DebouncePhase::Idle,
                generation: 0,
                timer: None,
            }),
        });

        let weak: Weak<Shared> = Arc::downgrade(&shared);
        let listener = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(_) | Err(RecvError::Lagged(_)) => {
                        let Some(shared) = weak.upgrade() else { break };
                        shared.rehydrate();
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Self { shared, listener }
    }

    pub fn with_default_delay(navigation: Arc<dyn NavigationState>) -> Self {
        Self::new(navigation, DEFAULT_DEBOUNCE)
    }

    // == Keystroke ==
    /// Echoes `value` immediately and (re)starts the debounce timer.
    pub fn input(&self, value: impl Into<String>) {
        let mut state = self.shared.lock();
        state.cancel_pending();
        state.raw_input = value.into();

        let generation = state.generation;
        state.phase = DebouncePhase::Pending { generation };
        let weak = Arc::downgrade(&self.shared);
        let delay = self.shared.delay;
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(shared) = weak.upgrade() {
                shared.expire(generation);
            }
        }));
    }

    // == Clear ==
    /// Empties the field and commits at once, cancelling any pending commit.
    pub fn clear(&self) {
        let mut state = self.shared.lock();
        state.cancel_pending();
        state.raw_input.clear();
        self.shared.commit(&mut state);
    }

    /// Commits a pending value now. Returns false if nothing was pending.
    pub fn flush(&self) -> bool {
        let mut state = self.shared.lock();
        if !matches!(state.phase, DebouncePhase::Pending { .. }) {
            return false;
        }
        state.cancel_pending();
        self.shared.commit(&mut state);
        true
    }

    // == Accessors ==
    /// Text currently shown in the field.
    pub fn raw_input(&self) -> String {
        self.shared.lock().raw_input.clone()
    }

    /// Text last written to navigation state by this controller.
    pub fn committed_value(&self) -> String {
        self.shared.lock().committed_value.clone()
    }

    pub fn phase(&self) -> DebouncePhase {
        self.shared.lock().phase
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.phase(), DebouncePhase::Pending { .. })
    }
}

impl Drop for SearchSyncController {
    fn drop(&mut self) {
        self.listener.abort();
        self.shared.lock().cancel_pending();
    }
}
