//! Content event history model.

use serde::Serialize;
use sqlx::FromRow;
use zds_core::types::{DbId, Timestamp};

/// A row from the `content_events` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ContentEventRow {
    pub id: DbId,
    pub content_id: DbId,
    pub event_type: String,
    pub revision_hash: Option<String>,
    pub actor_id: Option<DbId>,
    pub payload: serde_json::Value,
    pub created_at: Timestamp,
}
