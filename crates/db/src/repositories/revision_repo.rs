//! Repository for the `revisions` table.
//!
//! Revisions are write-once: there is no update method, and the table
//! carries a trigger rejecting UPDATE statements.

use sqlx::{PgConnection, PgPool};
use zds_core::hashing::revision_hash;
use zds_core::types::DbId;

use crate::models::revision::{DraftInput, Revision};

/// Column list for revisions queries.
const COLUMNS: &str = "id, content_id, hash, parent_hash, title, body, author_id, created_at";

/// Provides create and read operations for revisions.
pub struct RevisionRepo;

impl RevisionRepo {
    /// Store a revision of `content_id` on top of `parent_hash`.
    ///
    /// The hash is computed from parent, title and body. Saving the same
    /// text on the same parent returns the existing revision.
    pub(crate) async fn create_in(
        conn: &mut PgConnection,
        content_id: DbId,
        parent_hash: Option<&str>,
        input: &DraftInput,
    ) -> Result<Revision, sqlx::Error> {
        let hash = revision_hash(parent_hash, &input.title, &input.body);

        let query = format!(
            "INSERT INTO revisions (content_id, hash, parent_hash, title, body, author_id)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT ON CONSTRAINT uq_revisions_content_hash DO NOTHING
             RETURNING {COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, Revision>(&query)
            .bind(content_id)
            .bind(&hash)
            .bind(parent_hash)
            .bind(&input.title)
            .bind(&input.body)
            .bind(input.author_id)
            .fetch_optional(&mut *conn)
            .await?;

        match inserted {
            Some(revision) => Ok(revision),
            None => {
                tracing::debug!(content_id, hash = %hash, "Revision already exists, reusing it");
                let query = format!(
                    "SELECT {COLUMNS} FROM revisions WHERE content_id = $1 AND hash = $2"
                );
                sqlx::query_as::<_, Revision>(&query)
                    .bind(content_id)
                    .bind(&hash)
                    .fetch_one(&mut *conn)
                    .await
            }
        }
    }

    pub(crate) async fn find_in(
        conn: &mut PgConnection,
        content_id: DbId,
        hash: &str,
    ) -> Result<Option<Revision>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM revisions WHERE content_id = $1 AND hash = $2");
        sqlx::query_as::<_, Revision>(&query)
            .bind(content_id)
            .bind(hash)
            .fetch_optional(conn)
            .await
    }

    /// Whether `hash` names a revision of `content_id`.
    pub(crate) async fn exists_in(
        conn: &mut PgConnection,
        content_id: DbId,
        hash: &str,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM revisions WHERE content_id = $1 AND hash = $2)",
        )
        .bind(content_id)
        .bind(hash)
        .fetch_one(conn)
        .await
    }

    /// Find a revision of a content by hash.
    pub async fn find_by_hash(
        pool: &PgPool,
        content_id: DbId,
        hash: &str,
    ) -> Result<Option<Revision>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM revisions WHERE content_id = $1 AND hash = $2");
        sqlx::query_as::<_, Revision>(&query)
            .bind(content_id)
            .bind(hash)
            .fetch_optional(pool)
            .await
    }

    /// List all revisions of a content, newest first.
    pub async fn list_by_content(
        pool: &PgPool,
        content_id: DbId,
    ) -> Result<Vec<Revision>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM revisions
             WHERE content_id = $1
             ORDER BY id DESC"
        );
        sqlx::query_as::<_, Revision>(&query)
            .bind(content_id)
            .fetch_all(pool)
            .await
    }
}
