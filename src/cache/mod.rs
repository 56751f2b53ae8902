//! Cache Module
//!
//! Keyed, staleness-aware query cache with request dedup, polling and eviction.

mod entry;
mod fingerprint;
mod lru;
mod stats;
mod store;
mod subscription;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::{CacheEntry, QueryOptions, QueryStatus, RequestId};
pub use fingerprint::{Entity, Filters, Fingerprint};
pub use lru::LruTracker;
pub use stats::CacheStats;
pub use store::QueryCache;
pub(crate) use store::WeakQueryCache;
pub use subscription::{QueryState, Subscription};
