//! Durable history of content events.
//!
//! [`EventPersistence`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! and writes every [`ContentEvent`] to the `content_events` table. It runs
//! as a long-lived background task and stops when the bus is dropped.

use tokio::sync::broadcast;
use zds_core::types::DbId;
use zds_db::repositories::ContentEventRepo;
use zds_db::DbPool;

use crate::bus::ContentEvent;

/// Background service that persists content events.
pub struct EventPersistence;

impl EventPersistence {
    /// Run the persistence loop until the channel closes.
    ///
    /// A failed insert is logged and skipped; the transition it describes
    /// is already committed.
    pub async fn run(pool: DbPool, mut receiver: broadcast::Receiver<ContentEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if let Err(e) = Self::persist(&pool, &event).await {
                        tracing::error!(
                            error = %e,
                            event_type = %event.event_type,
                            content_id = event.content_id,
                            "Failed to persist content event"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        skipped = n,
                        "Event persistence lagged, some events were not persisted"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, persistence shutting down");
                    break;
                }
            }
        }
    }

    /// Write a single event to the `content_events` table.
    pub async fn persist(pool: &DbPool, event: &ContentEvent) -> Result<DbId, sqlx::Error> {
        ContentEventRepo::insert(
            pool,
            event.content_id,
            &event.event_type,
            event.revision_hash.as_deref(),
            event.actor_id,
            &event.payload,
        )
        .await
    }
}
