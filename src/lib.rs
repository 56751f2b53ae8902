//! Dashboard Sync - client-side data layer for a dashboard REST API
//!
//! Provides a staleness-aware query cache with request deduplication and
//! polling, mutation-driven invalidation, and a debounced search field kept
//! in sync with navigation state.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod invalidation;
pub mod models;
pub mod search;
pub mod tasks;

pub use api::{DashboardApi, HttpTransport, Transport};
pub use cache::{Fingerprint, QueryCache, QueryOptions, QueryState, QueryStatus, Subscription};
pub use config::Config;
pub use error::{FetchError, SyncError};
pub use invalidation::{InvalidationBus, MutationKind};
pub use search::{MemoryNavigation, NavigationState, SearchSyncController};
pub use tasks::spawn_eviction_task;
