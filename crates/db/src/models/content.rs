//! Content entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use zds_core::content_type::ContentType;
use zds_core::error::CoreError;
use zds_core::publication::{ContentState, IndexTicket, ReindexFlags, RevisionPointers};
use zds_core::types::{DbId, Timestamp};

/// A row from the `contents` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Content {
    pub id: DbId,
    pub content_type: String,
    pub title: String,
    pub slug: String,
    pub sha_draft: Option<String>,
    pub sha_beta: Option<String>,
    pub sha_approved: Option<String>,
    pub sha_public: Option<String>,
    pub is_obsolete: bool,
    pub must_reindex: bool,
    pub es_flagged: bool,
    pub es_already_indexed: bool,
    pub flagged_at: Option<Timestamp>,
    pub flag_version: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Content {
    pub fn content_type(&self) -> Result<ContentType, CoreError> {
        self.content_type.parse()
    }

    /// The state-machine view of this row.
    pub fn state(&self) -> Result<ContentState, CoreError> {
        Ok(ContentState {
            content_type: self.content_type()?,
            pointers: RevisionPointers {
                draft: self.sha_draft.clone(),
                beta: self.sha_beta.clone(),
                approved: self.sha_approved.clone(),
                public: self.sha_public.clone(),
            },
            is_obsolete: self.is_obsolete,
            flags: ReindexFlags {
                must_reindex: self.must_reindex,
                es_flagged: self.es_flagged,
                es_already_indexed: self.es_already_indexed,
                flagged_at: self.flagged_at,
                flag_version: self.flag_version,
            },
        })
    }
}

/// DTO for authoring a new content with its first revision.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateContent {
    pub content_type: ContentType,
    pub title: String,
    pub body: String,
    pub author_id: Option<DbId>,
}

/// A flagged content as seen by the reindex pass.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FlaggedContent {
    pub id: DbId,
    pub content_type: String,
    pub slug: String,
    pub sha_public: Option<String>,
    pub is_obsolete: bool,
    pub flagged_at: Timestamp,
    pub flag_version: i64,
}

impl FlaggedContent {
    /// The ticket to hand back when acknowledging this content.
    pub fn ticket(&self) -> IndexTicket {
        IndexTicket {
            content_id: self.id,
            revision_hash: self.sha_public.clone(),
            flag_version: self.flag_version,
        }
    }

    /// Keyset position of this row in the flagged scan.
    pub fn checkpoint(&self) -> FlagCheckpoint {
        FlagCheckpoint {
            flagged_at: self.flagged_at,
            id: self.id,
        }
    }
}

/// Keyset cursor for paging through flagged content in `(flagged_at, id)`
/// order. Rows strictly after the checkpoint are returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagCheckpoint {
    pub flagged_at: Timestamp,
    pub id: DbId,
}
