use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zds_core::document::SearchBoosts;
use zds_core::filters::FilterRegistry;
use zds_events::{EventBus, EventPersistence};
use zds_worker::config::{LogFormat, WorkerConfig};
use zds_worker::indexer::ElasticsearchIndexer;
use zds_worker::reindex::{DocumentBuilder, PgReindexStore, Reindexer};
use zds_worker::startup;

/// How long background tasks get to finish after shutdown is requested.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = WorkerConfig::from_env().context("Invalid worker configuration")?;

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "zds_worker=debug,zds_db=info".into());
    match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }

    tracing::info!(
        es_url = %config.search.url,
        es_index = %config.search.index,
        interval_secs = config.reindex_interval.as_secs(),
        "Loaded worker configuration"
    );
    tracing::info!(
        policy = ?config.publication_policy(),
        "Publication policy"
    );

    // --- Database ---
    let pool = zds_db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    zds_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    // --- Startup validation ---
    let registry = FilterRegistry::with_builtins();
    let chain = startup::validate(&config, &registry, &pool).await?;

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());
    let persistence_handle = tokio::spawn(EventPersistence::run(
        pool.clone(),
        event_bus.subscribe(),
    ));

    // --- Reindex loop ---
    let indexer = ElasticsearchIndexer::new(
        &config.search.url,
        &config.search.index,
        config.search.timeout,
    )
    .context("Failed to build search engine client")?;
    let reindexer = Reindexer::new(
        Arc::new(PgReindexStore::new(pool.clone())),
        Arc::new(indexer),
        DocumentBuilder::new(chain, SearchBoosts::default()),
        config.reindex_batch_size,
    );

    let cancel = CancellationToken::new();
    let reindex_handle = {
        let cancel = cancel.clone();
        let events = event_bus.subscribe();
        let interval = config.reindex_interval;
        tokio::spawn(async move { reindexer.run(interval, events, cancel).await })
    };
    tracing::info!("Worker started");

    shutdown_signal().await;
    tracing::info!("Shutdown requested, stopping background tasks");

    cancel.cancel();
    let _ = tokio::time::timeout(SHUTDOWN_GRACE, reindex_handle).await;
    tracing::info!("Reindex loop stopped");

    // Dropping the last sender closes the channel and ends persistence.
    drop(event_bus);
    let _ = tokio::time::timeout(SHUTDOWN_GRACE, persistence_handle).await;
    tracing::info!("Event persistence stopped");

    pool.close().await;
    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
