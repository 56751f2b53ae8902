//! Invalidation Module
//!
//! Declarative mutation → key-prefix table and the bus that applies it.

mod bus;
mod rules;

pub use bus::{InvalidationBus, InvalidationReport};
pub use rules::{InvalidationRule, InvalidationScope, MutationKind};
