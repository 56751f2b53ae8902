//! Search Module
//!
//! Debounced two-way binding between a search field and navigation state.

mod controller;
mod navigation;

pub use controller::{
    DebouncePhase, SearchSyncController, DEFAULT_DEBOUNCE, FIRST_PAGE, PAGE_KEY, SEARCH_KEY,
};
pub use navigation::{MemoryNavigation, NavigationEvent, NavigationState};
