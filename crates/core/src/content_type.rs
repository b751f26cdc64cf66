//! Content types and the per-type publication policy.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const TYPE_TUTORIAL: &str = "tutorial";
pub const TYPE_ARTICLE: &str = "article";
pub const TYPE_OPINION: &str = "opinion";

/// All valid content type names.
pub const VALID_CONTENT_TYPES: &[&str] = &[TYPE_TUTORIAL, TYPE_ARTICLE, TYPE_OPINION];

/// Kind of publishable content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Tutorial,
    Article,
    Opinion,
}

impl ContentType {
    /// Database / wire name of the type.
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Tutorial => TYPE_TUTORIAL,
            ContentType::Article => TYPE_ARTICLE,
            ContentType::Opinion => TYPE_OPINION,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            TYPE_TUTORIAL => Ok(ContentType::Tutorial),
            TYPE_ARTICLE => Ok(ContentType::Article),
            TYPE_OPINION => Ok(ContentType::Opinion),
            other => Err(CoreError::Validation(format!(
                "Invalid content type '{other}'. Must be one of: {}",
                VALID_CONTENT_TYPES.join(", ")
            ))),
        }
    }
}

/// Decides which content types must be approved before publication.
///
/// Types listed in `without_validation` may be published directly from
/// their draft; every other type can only publish its approved revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicationPolicy {
    without_validation: BTreeSet<ContentType>,
}

impl PublicationPolicy {
    /// Build a policy from the set of types allowed to skip validation.
    pub fn new(without_validation: impl IntoIterator<Item = ContentType>) -> Self {
        Self {
            without_validation: without_validation.into_iter().collect(),
        }
    }

    /// Policy where every type requires validation.
    pub fn strict() -> Self {
        Self::new([])
    }

    /// Whether publishing `content_type` requires an approved revision.
    pub fn requires_validation(&self, content_type: ContentType) -> bool {
        !self.without_validation.contains(&content_type)
    }
}

impl Default for PublicationPolicy {
    /// Tutorials and articles go through validation, opinions do not.
    fn default() -> Self {
        Self::new([ContentType::Opinion])
    }
}

/// Parse a comma-separated list of content type names.
///
/// Empty entries are skipped; an unknown name is a validation error.
pub fn parse_type_list(raw: &str) -> Result<Vec<ContentType>, CoreError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}
