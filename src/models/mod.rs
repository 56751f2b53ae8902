//! Dashboard API models
//!
//! Entities plus the DTOs used for serializing/deserializing request and
//! response bodies.

pub mod entities;
pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use entities::{Feature, Notification, Panel, Session};
pub use requests::{FeatureUpdate, NewFeature, PanelInput, SessionInput};
pub use responses::{Ack, NotificationPage, Page, UnreadCount};
