//! One-shot validation run before the worker starts its tasks.

use zds_core::error::CoreError;
use zds_core::filters::{FilterChain, FilterRegistry};
use zds_db::bootstrap::{verify_required_members, BootstrapError};
use zds_db::DbPool;

use crate::config::WorkerConfig;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Database health check failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid INDEX_TEXT_FILTERS: {0}")]
    Filters(#[source] CoreError),

    #[error(transparent)]
    Members(#[from] BootstrapError),
}

/// Check that the environment the worker depends on is in place.
///
/// Returns the resolved text filter chain for the document builder.
pub async fn validate(
    config: &WorkerConfig,
    registry: &FilterRegistry,
    pool: &DbPool,
) -> Result<FilterChain, StartupError> {
    let chain = registry
        .chain(&config.index_text_filters)
        .map_err(StartupError::Filters)?;

    zds_db::health_check(pool).await?;
    verify_required_members(pool, &config.required_members()).await?;

    tracing::info!(filters = ?chain.names(), "Startup validation passed");
    Ok(chain)
}
