//! Background Tasks Module
//!
//! Timers that run alongside the query cache.
//!
//! # Tasks
//! - Eviction: sweeps entries unsubscribed past the grace period
//! - Poll: refetches one subscribed query at a fixed interval

mod eviction;
mod poll;

pub use eviction::spawn_eviction_task;
pub(crate) use poll::spawn_poll_task;
