//! Repository for the `content_events` history table.

use sqlx::PgPool;
use zds_core::types::DbId;

use crate::models::content_event::ContentEventRow;

/// Column list for content_events queries.
const COLUMNS: &str = "id, content_id, event_type, revision_hash, actor_id, payload, created_at";

/// Append and read operations for content transition history.
pub struct ContentEventRepo;

impl ContentEventRepo {
    /// Insert a new event row, returning the generated ID.
    pub async fn insert(
        pool: &PgPool,
        content_id: DbId,
        event_type: &str,
        revision_hash: Option<&str>,
        actor_id: Option<DbId>,
        payload: &serde_json::Value,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO content_events \
                (content_id, event_type, revision_hash, actor_id, payload) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id",
        )
        .bind(content_id)
        .bind(event_type)
        .bind(revision_hash)
        .bind(actor_id)
        .bind(payload)
        .fetch_one(pool)
        .await
    }

    /// History of one content, oldest first.
    pub async fn list_by_content(
        pool: &PgPool,
        content_id: DbId,
    ) -> Result<Vec<ContentEventRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM content_events WHERE content_id = $1 ORDER BY id"
        );
        sqlx::query_as::<_, ContentEventRow>(&query)
            .bind(content_id)
            .fetch_all(pool)
            .await
    }
}
