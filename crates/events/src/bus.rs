//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] fans out [`ContentEvent`]s to the history writer and to the
//! reindex loop. It is shared via `Arc<EventBus>`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use zds_core::publication::{Transition, REINDEX_EVENTS};
use zds_core::types::{DbId, RevisionHash};

// ---------------------------------------------------------------------------
// ContentEvent
// ---------------------------------------------------------------------------

/// Something that happened to one content.
///
/// Constructed via [`ContentEvent::new`] or [`ContentEvent::from_transition`]
/// and enriched with the builder methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentEvent {
    /// Dot-separated event name, e.g. `"content.published"`.
    pub event_type: String,

    pub content_id: DbId,

    /// Revision the event is about, when there is one.
    pub revision_hash: Option<RevisionHash>,

    /// Member who triggered the event.
    pub actor_id: Option<DbId>,

    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl ContentEvent {
    pub fn new(event_type: impl Into<String>, content_id: DbId) -> Self {
        Self {
            event_type: event_type.into(),
            content_id,
            revision_hash: None,
            actor_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// Describe a committed transition. The payload records the resulting
    /// lifecycle state and whether the content was flagged.
    pub fn from_transition(content_id: DbId, transition: &Transition) -> Self {
        let mut event = Self::new(transition.event_type, content_id).with_payload(
            serde_json::json!({
                "state": transition.state.publication_state(),
                "reindex": transition.reindex,
            }),
        );
        event.revision_hash = transition.revision_hash.clone();
        event
    }

    pub fn with_revision(mut self, hash: impl Into<RevisionHash>) -> Self {
        self.revision_hash = Some(hash.into());
        self
    }

    pub fn with_actor(mut self, member_id: DbId) -> Self {
        self.actor_id = Some(member_id);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Whether this event follows a transition that flagged the content.
    pub fn triggers_reindex(&self) -> bool {
        REINDEX_EVENTS.contains(&self.event_type.as_str())
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// ```rust
/// use zds_events::bus::{ContentEvent, EventBus};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(ContentEvent::new("content.created", 1));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<ContentEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// Without subscribers the event is dropped.
    pub fn publish(&self, event: ContentEvent) {
        // A SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ContentEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
