//! Publication and search reindex worker.
//!
//! - [`publication::Publisher`] applies content transitions and announces
//!   them on the event bus.
//! - [`reindex::Reindexer`] drains reindex flags into the search engine.
//! - [`indexer`] holds the search engine adapters.

pub mod config;
pub mod indexer;
pub mod publication;
pub mod reindex;
pub mod startup;
