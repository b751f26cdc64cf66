//! Search Index Adapter.
//!
//! [`SearchIndexer`] is the seam between the reindex pass and the search
//! engine. [`ElasticsearchIndexer`] talks to Elasticsearch over HTTP;
//! [`MemoryIndexer`] keeps documents in memory for tests and dry runs.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use zds_core::document::{document_id, IndexDocument};
use zds_core::types::DbId;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    /// The request never got an answer (network, DNS, timeout).
    #[error("Search engine unreachable: {0}")]
    Unreachable(String),

    /// The engine answered with a non-success status.
    #[error("Search engine rejected the request with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The request could not be built.
    #[error("Malformed search request: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for IndexerError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            IndexerError::Malformed(e.to_string())
        } else {
            IndexerError::Unreachable(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SearchIndexer: Send + Sync {
    /// Create or replace the entry for `document.content_id`.
    async fn upsert(&self, document: &IndexDocument) -> Result<(), IndexerError>;

    /// Delete the entry of a content. Deleting a missing entry succeeds.
    async fn remove(&self, content_id: DbId) -> Result<(), IndexerError>;
}

// ---------------------------------------------------------------------------
// Elasticsearch
// ---------------------------------------------------------------------------

/// Elasticsearch document API client.
///
/// Documents live at `{url}/{index}/_doc/content-{id}`.
#[derive(Debug)]
pub struct ElasticsearchIndexer {
    client: reqwest::Client,
    base_url: String,
    index: String,
}

impl ElasticsearchIndexer {
    pub fn new(url: &str, index: &str, timeout: Duration) -> Result<Self, IndexerError> {
        if index.trim().is_empty() {
            return Err(IndexerError::Malformed("index name must not be empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IndexerError::Malformed(e.to_string()))?;
        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            index: index.to_string(),
        })
    }

    fn document_url(&self, content_id: DbId) -> String {
        format!(
            "{}/{}/_doc/{}",
            self.base_url,
            self.index,
            document_id(content_id)
        )
    }

    async fn rejected(response: reqwest::Response) -> IndexerError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        IndexerError::Rejected { status, body }
    }
}

#[async_trait]
impl SearchIndexer for ElasticsearchIndexer {
    async fn upsert(&self, document: &IndexDocument) -> Result<(), IndexerError> {
        let response = self
            .client
            .put(self.document_url(document.content_id))
            .json(document)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::rejected(response).await);
        }
        tracing::debug!(
            content_id = document.content_id,
            hash = %document.revision_hash,
            "Document indexed"
        );
        Ok(())
    }

    async fn remove(&self, content_id: DbId) -> Result<(), IndexerError> {
        let response = self
            .client
            .delete(self.document_url(content_id))
            .send()
            .await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            tracing::debug!(content_id, "Document already absent from index");
            return Ok(());
        }
        if !status.is_success() {
            return Err(Self::rejected(response).await);
        }
        tracing::debug!(content_id, "Document removed from index");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Keeps documents in a map. Failures can be injected with
/// [`fail_next`](MemoryIndexer::fail_next).
#[derive(Default)]
pub struct MemoryIndexer {
    documents: Mutex<BTreeMap<DbId, IndexDocument>>,
    failures: AtomicUsize,
}

impl MemoryIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` calls fail as if the engine were down.
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub fn get(&self, content_id: DbId) -> Option<IndexDocument> {
        self.lock().get(&content_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<DbId, IndexDocument>> {
        // A poisoned map still holds consistent documents.
        self.documents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn injected_failure(&self) -> Result<(), IndexerError> {
        let remaining = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match remaining {
            Ok(_) => Err(IndexerError::Unreachable("injected failure".into())),
            Err(_) => Ok(()),
        }
    }
}

#[async_trait]
impl SearchIndexer for MemoryIndexer {
    async fn upsert(&self, document: &IndexDocument) -> Result<(), IndexerError> {
        self.injected_failure()?;
        self.lock().insert(document.content_id, document.clone());
        Ok(())
    }

    async fn remove(&self, content_id: DbId) -> Result<(), IndexerError> {
        self.injected_failure()?;
        self.lock().remove(&content_id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
