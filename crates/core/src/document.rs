//! Projection of a public revision into a search engine document.

use serde::{Deserialize, Serialize};

use crate::content_type::ContentType;
use crate::error::CoreError;
use crate::filters::FilterChain;
use crate::types::DbId;

/// Boost multiplier applied to obsolete content.
pub const OBSOLETE_BOOST_FACTOR: f64 = 0.5;

/// Relevance boosts per content type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchBoosts {
    pub tutorial: f64,
    pub article: f64,
    pub opinion: f64,
    /// Multiplier applied on top of the type boost when obsolete.
    pub obsolete_factor: f64,
}

impl Default for SearchBoosts {
    fn default() -> Self {
        Self {
            tutorial: 1.0,
            article: 1.0,
            opinion: 0.66,
            obsolete_factor: OBSOLETE_BOOST_FACTOR,
        }
    }
}

impl SearchBoosts {
    pub fn boost_for(&self, content_type: ContentType, is_obsolete: bool) -> f64 {
        let base = match content_type {
            ContentType::Tutorial => self.tutorial,
            ContentType::Article => self.article,
            ContentType::Opinion => self.opinion,
        };
        if is_obsolete {
            base * self.obsolete_factor
        } else {
            base
        }
    }
}

/// Everything needed to build a document, borrowed from content and revision.
#[derive(Debug, Clone, Copy)]
pub struct DocumentSource<'a> {
    pub content_id: DbId,
    pub content_type: ContentType,
    pub slug: &'a str,
    pub is_obsolete: bool,
    pub revision_hash: &'a str,
    pub title: &'a str,
    pub body: &'a str,
}

/// The searchable projection of a public revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub content_id: DbId,
    pub revision_hash: String,
    pub content_type: ContentType,
    pub title: String,
    pub slug: String,
    pub text: String,
    pub is_obsolete: bool,
    pub boost: f64,
}

/// Stable search engine id of a content's entry.
pub fn document_id(content_id: DbId) -> String {
    format!("content-{content_id}")
}

/// Build the document for `source`, running its body through `chain`.
///
/// A revision without a title cannot be indexed.
pub fn build_document(
    source: &DocumentSource<'_>,
    chain: &FilterChain,
    boosts: &SearchBoosts,
) -> Result<IndexDocument, CoreError> {
    let title = source.title.trim();
    if title.is_empty() {
        return Err(CoreError::Validation(format!(
            "Revision {} of content {} has an empty title",
            source.revision_hash, source.content_id
        )));
    }

    Ok(IndexDocument {
        content_id: source.content_id,
        revision_hash: source.revision_hash.to_string(),
        content_type: source.content_type,
        title: title.to_string(),
        slug: source.slug.to_string(),
        text: chain.apply(source.body),
        is_obsolete: source.is_obsolete,
        boost: boosts.boost_for(source.content_type, source.is_obsolete),
    })
}
