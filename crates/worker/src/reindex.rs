//! Reindex pass and its background loop.
//!
//! A pass pages through every flagged content in `(flagged_at, id)` order.
//! Public content is projected into an [`IndexDocument`] and upserted;
//! content without a public revision is removed from the index. Each
//! success is acknowledged with the ticket read at the start, so a content
//! that changed while it was being indexed stays flagged for the next pass.
//! Failures are logged and left flagged; passes never give up on a content.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use zds_core::document::{build_document, DocumentSource, IndexDocument, SearchBoosts};
use zds_core::error::CoreError;
use zds_core::filters::FilterChain;
use zds_core::publication::IndexTicket;
use zds_core::types::DbId;
use zds_db::models::content::{FlagCheckpoint, FlaggedContent};
use zds_db::models::revision::Revision;
use zds_db::repositories::{ContentRepo, RevisionRepo};
use zds_db::{DbError, DbPool};
use zds_events::ContentEvent;

use crate::indexer::{IndexerError, SearchIndexer};

// ---------------------------------------------------------------------------
// Store seam
// ---------------------------------------------------------------------------

/// What the reindex pass needs from content storage.
#[async_trait]
pub trait ReindexStore: Send + Sync {
    async fn flagged_since(
        &self,
        checkpoint: Option<&FlagCheckpoint>,
        limit: i64,
    ) -> Result<Vec<FlaggedContent>, DbError>;

    async fn load_revision(&self, content_id: DbId, hash: &str)
        -> Result<Option<Revision>, DbError>;

    /// Compare-and-clear acknowledgment. `false` means the ticket was stale.
    async fn mark_indexed(&self, ticket: &IndexTicket) -> Result<bool, DbError>;
}

/// [`ReindexStore`] backed by the PostgreSQL repositories.
#[derive(Clone)]
pub struct PgReindexStore {
    pool: DbPool,
}

impl PgReindexStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReindexStore for PgReindexStore {
    async fn flagged_since(
        &self,
        checkpoint: Option<&FlagCheckpoint>,
        limit: i64,
    ) -> Result<Vec<FlaggedContent>, DbError> {
        Ok(ContentRepo::list_flagged_since(&self.pool, checkpoint, limit).await?)
    }

    async fn load_revision(
        &self,
        content_id: DbId,
        hash: &str,
    ) -> Result<Option<Revision>, DbError> {
        Ok(RevisionRepo::find_by_hash(&self.pool, content_id, hash).await?)
    }

    async fn mark_indexed(&self, ticket: &IndexTicket) -> Result<bool, DbError> {
        ContentRepo::mark_indexed(&self.pool, ticket).await
    }
}

// ---------------------------------------------------------------------------
// Errors and report
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ReindexError {
    #[error(transparent)]
    Store(#[from] DbError),

    #[error(transparent)]
    Indexer(#[from] IndexerError),

    #[error("Cannot build index document: {0}")]
    Document(#[from] CoreError),

    #[error("Public revision {hash} of content {content_id} not found")]
    MissingRevision { content_id: DbId, hash: String },
}

/// Counters for one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Flagged contents read.
    pub seen: usize,
    /// Documents upserted and acknowledged.
    pub indexed: usize,
    /// Entries removed and acknowledged.
    pub removed: usize,
    /// Contents left flagged after an error.
    pub failed: usize,
    /// Contents processed whose acknowledgment was stale.
    pub stale: usize,
}

enum Processed {
    Indexed,
    Removed,
}

// ---------------------------------------------------------------------------
// Document projection
// ---------------------------------------------------------------------------

/// Turns a flagged content and its public revision into a document.
#[derive(Debug, Clone, Default)]
pub struct DocumentBuilder {
    chain: FilterChain,
    boosts: SearchBoosts,
}

impl DocumentBuilder {
    pub fn new(chain: FilterChain, boosts: SearchBoosts) -> Self {
        Self { chain, boosts }
    }

    pub fn build(
        &self,
        content: &FlaggedContent,
        revision: &Revision,
    ) -> Result<IndexDocument, CoreError> {
        let source = DocumentSource {
            content_id: content.id,
            content_type: content.content_type.parse()?,
            slug: &content.slug,
            is_obsolete: content.is_obsolete,
            revision_hash: &revision.hash,
            title: &revision.title,
            body: &revision.body,
        };
        build_document(&source, &self.chain, &self.boosts)
    }
}

// ---------------------------------------------------------------------------
// Reindexer
// ---------------------------------------------------------------------------

/// Drains the reindex flags into the search engine.
pub struct Reindexer {
    store: Arc<dyn ReindexStore>,
    indexer: Arc<dyn SearchIndexer>,
    builder: DocumentBuilder,
    batch_size: i64,
}

impl Reindexer {
    pub fn new(
        store: Arc<dyn ReindexStore>,
        indexer: Arc<dyn SearchIndexer>,
        builder: DocumentBuilder,
        batch_size: i64,
    ) -> Self {
        Self {
            store,
            indexer,
            builder,
            batch_size: batch_size.max(1),
        }
    }

    /// Process every flagged content once.
    ///
    /// Only a failure to list flagged content aborts the pass; errors on a
    /// single content are counted in [`PassReport::failed`].
    pub async fn run_pass(&self) -> Result<PassReport, ReindexError> {
        let pass_id = uuid::Uuid::now_v7();
        let span = tracing::info_span!("reindex_pass", %pass_id);
        self.drain().instrument(span).await
    }

    async fn drain(&self) -> Result<PassReport, ReindexError> {
        let mut report = PassReport::default();
        let mut checkpoint: Option<FlagCheckpoint> = None;

        loop {
            let page = self
                .store
                .flagged_since(checkpoint.as_ref(), self.batch_size)
                .await?;
            let Some(last) = page.last() else {
                break;
            };
            checkpoint = Some(last.checkpoint());
            let full_page = page.len() as i64 == self.batch_size;

            for content in &page {
                report.seen += 1;
                let ticket = content.ticket();

                let processed = match self.process(content, &ticket).await {
                    Ok(processed) => processed,
                    Err(e) => {
                        report.failed += 1;
                        tracing::warn!(
                            content_id = content.id,
                            hash = ?ticket.revision_hash,
                            error = %e,
                            "Indexing failed, content stays flagged"
                        );
                        continue;
                    }
                };

                match self.store.mark_indexed(&ticket).await {
                    Ok(true) => match processed {
                        Processed::Indexed => report.indexed += 1,
                        Processed::Removed => report.removed += 1,
                    },
                    Ok(false) => {
                        report.stale += 1;
                        tracing::debug!(
                            content_id = content.id,
                            "Content changed while indexing, left for next pass"
                        );
                    }
                    Err(e) => {
                        report.failed += 1;
                        tracing::warn!(
                            content_id = content.id,
                            error = %e,
                            "Failed to acknowledge indexed content"
                        );
                    }
                }
            }

            if !full_page {
                break;
            }
        }

        if report.seen > 0 {
            tracing::info!(
                seen = report.seen,
                indexed = report.indexed,
                removed = report.removed,
                failed = report.failed,
                stale = report.stale,
                "Reindex pass finished"
            );
        } else {
            tracing::debug!("Reindex pass found nothing flagged");
        }
        Ok(report)
    }

    async fn process(
        &self,
        content: &FlaggedContent,
        ticket: &IndexTicket,
    ) -> Result<Processed, ReindexError> {
        let Some(hash) = ticket.revision_hash.as_deref() else {
            self.indexer.remove(content.id).await?;
            return Ok(Processed::Removed);
        };

        let revision = self
            .store
            .load_revision(content.id, hash)
            .await?
            .ok_or_else(|| ReindexError::MissingRevision {
                content_id: content.id,
                hash: hash.to_string(),
            })?;
        let document = self.builder.build(content, &revision)?;
        self.indexer.upsert(&document).await?;
        Ok(Processed::Indexed)
    }

    /// Run passes every `interval` and whenever a reindex-triggering event
    /// arrives, until `cancel` is triggered.
    pub async fn run(
        &self,
        interval: Duration,
        mut events: broadcast::Receiver<ContentEvent>,
        cancel: CancellationToken,
    ) {
        tracing::info!(
            interval_secs = interval.as_secs(),
            batch_size = self.batch_size,
            "Reindex loop started"
        );

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut events_open = true;

        loop {
            let wake = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Reindex loop stopping");
                    break;
                }
                _ = ticker.tick() => true,
                received = events.recv(), if events_open => match received {
                    Ok(event) => event.triggers_reindex(),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Reindex loop lagged behind the event bus");
                        true
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::debug!("Event bus closed, reindex loop continues on its timer");
                        events_open = false;
                        false
                    }
                },
            };

            if !wake {
                continue;
            }
            if let Err(e) = self.run_pass().await {
                tracing::error!(error = %e, "Reindex pass failed");
            }
            ticker.reset();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
