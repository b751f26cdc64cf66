//! Named text filters applied when projecting a revision into the index.
//!
//! Filters are plain functions registered by name in a [`FilterRegistry`]
//! at startup. Configuration refers to them by name; [`FilterRegistry::chain`]
//! resolves those names once, so an unknown name fails initialization rather
//! than an indexing pass.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::CoreError;

/// Signature of a text filter.
pub type FilterFn = fn(&str) -> String;

pub const FILTER_STRIP_MARKDOWN: &str = "strip_markdown";
pub const FILTER_COLLAPSE_WHITESPACE: &str = "collapse_whitespace";
pub const FILTER_LOWERCASE: &str = "lowercase";

/// Filter chain used when none is configured.
pub const DEFAULT_CHAIN: &[&str] = &[FILTER_STRIP_MARKDOWN, FILTER_COLLAPSE_WHITESPACE];

static CODE_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*(```|~~~).*$").expect("valid regex"));
static IMAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[([^\]]*)\]\([^)]*\)").expect("valid regex"));
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("valid regex"));
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]{0,3}#{1,6}[ \t]*").expect("valid regex"));
static QUOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*>[ \t]?").expect("valid regex"));
static LIST_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*(?:[-+*]|\d+\.)[ \t]+").expect("valid regex"));
// Emphasis markers are only stripped in pairs wrapping non-blank text, so
// a lone `*` in "2 * 3" survives.
static STAR_EMPHASIS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\*{1,3}([^*\s](?:[^*\n]*[^*\s])?)\*{1,3}").expect("valid regex")
});
static UNDERSCORE_STRONG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"__([^_\s](?:[^_\n]*[^_\s])?)__").expect("valid regex")
});
static STRIKETHROUGH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"~~([^~\n]+)~~").expect("valid regex"));
static INLINE_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`+([^`\n]+)`+").expect("valid regex"));

/// Remove markdown syntax, keeping the readable text.
pub fn strip_markdown(text: &str) -> String {
    let text = CODE_FENCE_RE.replace_all(text, "");
    let text = IMAGE_RE.replace_all(&text, "$1");
    let text = LINK_RE.replace_all(&text, "$1");
    let text = HEADING_RE.replace_all(&text, "");
    let text = QUOTE_RE.replace_all(&text, "");
    let text = LIST_MARKER_RE.replace_all(&text, "");
    let text = STAR_EMPHASIS_RE.replace_all(&text, "$1");
    let text = UNDERSCORE_STRONG_RE.replace_all(&text, "$1");
    let text = STRIKETHROUGH_RE.replace_all(&text, "$1");
    INLINE_CODE_RE.replace_all(&text, "$1").into_owned()
}

/// Collapse runs of whitespace (including newlines) into single spaces.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn lowercase(text: &str) -> String {
    text.to_lowercase()
}

/// Name → filter lookup table.
#[derive(Debug, Clone, Default)]
pub struct FilterRegistry {
    filters: BTreeMap<String, FilterFn>,
}

impl FilterRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in filters.
    pub fn with_builtins() -> Self {
        let mut filters: BTreeMap<String, FilterFn> = BTreeMap::new();
        filters.insert(FILTER_STRIP_MARKDOWN.into(), strip_markdown);
        filters.insert(FILTER_COLLAPSE_WHITESPACE.into(), collapse_whitespace);
        filters.insert(FILTER_LOWERCASE.into(), lowercase);
        Self { filters }
    }

    /// Register a filter. A name can only be registered once.
    pub fn register(&mut self, name: impl Into<String>, filter: FilterFn) -> Result<(), CoreError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CoreError::Validation("Filter name must not be empty".into()));
        }
        if self.filters.contains_key(&name) {
            return Err(CoreError::Conflict(format!(
                "Filter '{name}' is already registered"
            )));
        }
        self.filters.insert(name, filter);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<FilterFn> {
        self.filters.get(name).copied()
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(String::as_str)
    }

    /// Resolve `names` into a chain, failing on the first unknown name.
    pub fn chain<S: AsRef<str>>(&self, names: &[S]) -> Result<FilterChain, CoreError> {
        let steps = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.get(name).map(|f| (name.to_string(), f)).ok_or_else(|| {
                    CoreError::Validation(format!(
                        "Unknown text filter '{name}'. Registered filters: {}",
                        self.names().collect::<Vec<_>>().join(", ")
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FilterChain { steps })
    }
}

/// An ordered list of resolved filters.
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    steps: Vec<(String, FilterFn)>,
}

impl FilterChain {
    /// Run every filter in order.
    pub fn apply(&self, text: &str) -> String {
        self.steps
            .iter()
            .fold(text.to_string(), |acc, (_, filter)| filter(&acc))
    }

    pub fn names(&self) -> Vec<&str> {
        self.steps.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
