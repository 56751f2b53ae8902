//! API Module
//!
//! Client side of the dashboard REST API.
//!
//! # Endpoints
//! - `GET /api/{features,notifications,panels,sessions}` - Paginated lists
//! - `GET /api/<entity>/<id>` - Single records
//! - `GET /api/notifications/unread-count` - Unread counter
//! - `POST /api/<entity>`, `PUT /api/<entity>/<id>` - Create/update
//! - `POST /api/notifications/<id>/read`, `POST /api/notifications/read-all`

pub mod dashboard;
pub mod transport;

pub use dashboard::{detail_path, list_path, DashboardApi, UNREAD_COUNT};
pub use transport::{decode, HttpTransport, Transport};
