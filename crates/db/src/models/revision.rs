//! Revision model.
//!
//! Revisions are immutable snapshots of a content's title and body,
//! identified by [`zds_core::hashing::revision_hash`].

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use zds_core::types::{DbId, Timestamp};

/// A row from the `revisions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Revision {
    pub id: DbId,
    pub content_id: DbId,
    pub hash: String,
    pub parent_hash: Option<String>,
    pub title: String,
    pub body: String,
    pub author_id: Option<DbId>,
    pub created_at: Timestamp,
}

/// Title and body of a new working revision.
#[derive(Debug, Clone, Deserialize)]
pub struct DraftInput {
    pub title: String,
    pub body: String,
    pub author_id: Option<DbId>,
}
