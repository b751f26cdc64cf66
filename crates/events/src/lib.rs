//! Content event bus and history persistence.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`ContentEvent`]: the envelope for one publication transition.
//! - [`EventPersistence`]: background service writing every event to the
//!   `content_events` table.

pub mod bus;
pub mod persistence;

pub use bus::{ContentEvent, EventBus};
pub use persistence::EventPersistence;
