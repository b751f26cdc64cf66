//! Domain core for content publication and search reindexing.
//!
//! This crate has no I/O. It defines the publication state machine, the
//! reindex flag rules, revision hashing, and the projection of a public
//! revision into a search document. Storage lives in `zds-db`, the indexer
//! and the publication service in `zds-worker`.

pub mod authoring;
pub mod content_type;
pub mod document;
pub mod error;
pub mod filters;
pub mod hashing;
pub mod publication;
pub mod types;
