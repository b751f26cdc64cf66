//! Member entity model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use zds_core::types::{DbId, Timestamp};

/// A row from the `members` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Member {
    pub id: DbId,
    pub username: String,
    pub created_at: Timestamp,
}

/// DTO for creating a member.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMember {
    pub username: String,
}
