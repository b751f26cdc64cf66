//! Repository for the `contents` table.
//!
//! Pointer moves go through [`zds_core::publication::apply`] inside a
//! transaction that holds `FOR UPDATE` on the content row. The resulting
//! state (pointers and reindex flags together) is written with a single
//! UPDATE, so no reader ever sees public content that is not flagged.

use chrono::Utc;
use sqlx::{PgConnection, PgPool};
use zds_core::authoring::{generate_slug, validate_body, validate_title};
use zds_core::content_type::PublicationPolicy;
use zds_core::error::CoreError;
use zds_core::publication::{acknowledge, apply, Action, ContentState, IndexTicket, Transition};
use zds_core::types::DbId;

use crate::error::DbError;
use crate::models::content::{Content, CreateContent, FlagCheckpoint, FlaggedContent};
use crate::models::revision::{DraftInput, Revision};
use crate::repositories::RevisionRepo;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, content_type, title, slug, sha_draft, sha_beta, sha_approved, \
    sha_public, is_obsolete, must_reindex, es_flagged, es_already_indexed, flagged_at, \
    flag_version, created_at, updated_at";

/// Column list for the flagged scan.
const FLAGGED_COLUMNS: &str = "id, content_type, slug, sha_public, is_obsolete, flagged_at, flag_version";

/// A committed transition and the row as written.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub content: Content,
    pub transition: Transition,
}

/// Provides authoring, publication and reindex-flag operations for contents.
pub struct ContentRepo;

impl ContentRepo {
    // ── Authoring ────────────────────────────────────────────────────

    /// Create a content and its first revision, which becomes the draft.
    pub async fn create(
        pool: &PgPool,
        input: &CreateContent,
    ) -> Result<(Content, Revision), DbError> {
        validate_title(&input.title)?;
        validate_body(&input.body)?;
        let slug = generate_slug(&input.title);

        let mut tx = pool.begin().await?;

        let id: DbId = sqlx::query_scalar(
            "INSERT INTO contents (content_type, title, slug) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(input.content_type.as_str())
        .bind(&input.title)
        .bind(&slug)
        .fetch_one(&mut *tx)
        .await?;

        let draft = DraftInput {
            title: input.title.clone(),
            body: input.body.clone(),
            author_id: input.author_id,
        };
        let revision = RevisionRepo::create_in(&mut tx, id, None, &draft).await?;

        let query = format!(
            "UPDATE contents SET sha_draft = $2 WHERE id = $1 RETURNING {COLUMNS}"
        );
        let content = sqlx::query_as::<_, Content>(&query)
            .bind(id)
            .bind(&revision.hash)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            content_id = id,
            content_type = %input.content_type,
            hash = %revision.hash,
            "Content created"
        );
        Ok((content, revision))
    }

    /// Find a content by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Content>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM contents WHERE id = $1");
        sqlx::query_as::<_, Content>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Store a new revision on top of the current draft and point the draft
    /// at it. Public, approved and beta pointers and the reindex flags are
    /// left untouched. Saving text identical to the current draft is a no-op.
    pub async fn save_draft(
        pool: &PgPool,
        content_id: DbId,
        input: &DraftInput,
    ) -> Result<(TransitionOutcome, Revision), DbError> {
        validate_title(&input.title)?;
        validate_body(&input.body)?;

        let mut tx = pool.begin().await?;
        let content = Self::lock_in(&mut tx, content_id).await?;
        let state = content.state()?;

        let current = match content.sha_draft.as_deref() {
            Some(hash) => RevisionRepo::find_in(&mut tx, content_id, hash).await?,
            None => None,
        };
        let revision = match current {
            Some(current) if current.title == input.title && current.body == input.body => current,
            _ => {
                RevisionRepo::create_in(&mut tx, content_id, content.sha_draft.as_deref(), input)
                    .await?
            }
        };

        // Publication policy plays no part in draft saves.
        let transition = apply(
            &state,
            &Action::SaveDraft {
                hash: revision.hash.clone(),
            },
            &PublicationPolicy::strict(),
            Utc::now(),
        )?;

        let content = if transition.changed {
            sqlx::query("UPDATE contents SET title = $2 WHERE id = $1")
                .bind(content_id)
                .bind(&input.title)
                .execute(&mut *tx)
                .await?;
            Self::write_state_in(&mut tx, content_id, &transition.state).await?
        } else {
            content
        };

        tx.commit().await?;

        tracing::debug!(
            content_id,
            hash = %revision.hash,
            changed = transition.changed,
            "Draft saved"
        );
        Ok((
            TransitionOutcome {
                content,
                transition,
            },
            revision,
        ))
    }

    // ── Publication ──────────────────────────────────────────────────

    /// Apply a publication action atomically.
    ///
    /// Any hash named by the action must be a revision of this content. On
    /// error nothing is written.
    pub async fn transition(
        pool: &PgPool,
        content_id: DbId,
        action: &Action,
        policy: &PublicationPolicy,
    ) -> Result<TransitionOutcome, DbError> {
        let mut tx = pool.begin().await?;
        let content = Self::lock_in(&mut tx, content_id).await?;
        let state = content.state()?;

        if let Some(hash) = action.named_hash() {
            if !RevisionRepo::exists_in(&mut tx, content_id, hash).await? {
                return Err(CoreError::Validation(format!(
                    "Revision {hash} does not belong to content {content_id}"
                ))
                .into());
            }
        }

        let transition = apply(&state, action, policy, Utc::now())?;

        let content = if transition.changed {
            Self::write_state_in(&mut tx, content_id, &transition.state).await?
        } else {
            content
        };

        tx.commit().await?;

        if transition.reindex {
            tracing::info!(
                content_id,
                event = transition.event_type,
                hash = ?transition.revision_hash,
                "Content flagged for reindexing"
            );
        } else {
            tracing::debug!(
                content_id,
                event = transition.event_type,
                changed = transition.changed,
                "Content transition applied"
            );
        }

        Ok(TransitionOutcome {
            content,
            transition,
        })
    }

    // ── Reindex flags ────────────────────────────────────────────────

    /// List flagged contents strictly after `checkpoint`, in
    /// `(flagged_at, id)` order.
    pub async fn list_flagged_since(
        pool: &PgPool,
        checkpoint: Option<&FlagCheckpoint>,
        limit: i64,
    ) -> Result<Vec<FlaggedContent>, sqlx::Error> {
        let query = format!(
            "SELECT {FLAGGED_COLUMNS} FROM contents
             WHERE es_flagged
               AND ($1::timestamptz IS NULL OR (flagged_at, id) > ($1::timestamptz, $2::bigint))
             ORDER BY flagged_at, id
             LIMIT $3"
        );
        sqlx::query_as::<_, FlaggedContent>(&query)
            .bind(checkpoint.map(|c| c.flagged_at))
            .bind(checkpoint.map(|c| c.id))
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Clear the reindex flags for an indexed ticket.
    ///
    /// Returns `false` (and writes nothing) when the ticket is stale: the
    /// public revision changed, the content was flagged again after the
    /// ticket was read, or it is no longer flagged or no longer exists.
    pub async fn mark_indexed(pool: &PgPool, ticket: &IndexTicket) -> Result<bool, DbError> {
        let mut tx = pool.begin().await?;

        let query = format!("SELECT {COLUMNS} FROM contents WHERE id = $1 FOR UPDATE");
        let Some(content) = sqlx::query_as::<_, Content>(&query)
            .bind(ticket.content_id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(false);
        };

        let Some(next) = acknowledge(&content.state()?, ticket) else {
            tracing::debug!(
                content_id = ticket.content_id,
                "Stale index acknowledgment ignored"
            );
            return Ok(false);
        };

        Self::write_state_in(&mut tx, ticket.content_id, &next).await?;
        tx.commit().await?;
        Ok(true)
    }

    /// Number of contents waiting for the indexer.
    pub async fn count_flagged(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM contents WHERE es_flagged")
            .fetch_one(pool)
            .await
    }

    // ── Internals ────────────────────────────────────────────────────

    async fn lock_in(conn: &mut PgConnection, id: DbId) -> Result<Content, DbError> {
        let query = format!("SELECT {COLUMNS} FROM contents WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, Content>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound {
                    entity: "content",
                    id,
                }
                .into()
            })
    }

    async fn write_state_in(
        conn: &mut PgConnection,
        id: DbId,
        state: &ContentState,
    ) -> Result<Content, sqlx::Error> {
        let query = format!(
            "UPDATE contents SET
                sha_draft = $2,
                sha_beta = $3,
                sha_approved = $4,
                sha_public = $5,
                is_obsolete = $6,
                must_reindex = $7,
                es_flagged = $8,
                es_already_indexed = $9,
                flagged_at = $10,
                flag_version = $11,
                updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Content>(&query)
            .bind(id)
            .bind(&state.pointers.draft)
            .bind(&state.pointers.beta)
            .bind(&state.pointers.approved)
            .bind(&state.pointers.public)
            .bind(state.is_obsolete)
            .bind(state.flags.must_reindex)
            .bind(state.flags.es_flagged)
            .bind(state.flags.es_already_indexed)
            .bind(state.flags.flagged_at)
            .bind(state.flags.flag_version)
            .fetch_one(conn)
            .await
    }
}
