//! End-to-end tests: publisher transitions, emitted events, and a reindex
//! pass against the database with an in-memory search index.

use std::sync::Arc;

use assert_matches::assert_matches;
use sqlx::PgPool;
use tokio::sync::broadcast;
use zds_core::content_type::{ContentType, PublicationPolicy};
use zds_core::document::SearchBoosts;
use zds_core::error::CoreError;
use zds_core::filters::{FilterRegistry, DEFAULT_CHAIN};
use zds_core::publication::{EVENT_APPROVED, EVENT_CREATED, EVENT_DRAFT_SAVED, EVENT_PUBLISHED};
use zds_db::models::content::CreateContent;
use zds_db::models::revision::DraftInput;
use zds_db::repositories::{ContentEventRepo, ContentRepo};
use zds_db::DbError;
use zds_events::{ContentEvent, EventBus, EventPersistence};
use zds_worker::config::WorkerConfig;
use zds_worker::indexer::MemoryIndexer;
use zds_worker::publication::Publisher;
use zds_worker::reindex::{DocumentBuilder, PgReindexStore, Reindexer};

fn publisher(pool: &PgPool) -> (Publisher, broadcast::Receiver<ContentEvent>) {
    let bus = Arc::new(EventBus::default());
    let rx = bus.subscribe();
    (
        Publisher::new(pool.clone(), bus, PublicationPolicy::default()),
        rx,
    )
}

fn reindexer(pool: &PgPool, indexer: Arc<MemoryIndexer>) -> Reindexer {
    let chain = FilterRegistry::with_builtins().chain(DEFAULT_CHAIN).unwrap();
    Reindexer::new(
        Arc::new(PgReindexStore::new(pool.clone())),
        indexer,
        DocumentBuilder::new(chain, SearchBoosts::default()),
        50,
    )
}

fn tutorial(title: &str) -> CreateContent {
    CreateContent {
        content_type: ContentType::Tutorial,
        title: title.to_string(),
        body: "## Setup\n\nInstall the *toolchain*.".to_string(),
        author_id: None,
    }
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_transitions_emit_events_in_order(pool: PgPool) {
    let (publisher, mut rx) = publisher(&pool);

    let (content, revision) = publisher.create_content(&tutorial("Ownership")).await.unwrap();
    publisher.approve(content.id, &revision.hash, None).await.unwrap();
    publisher.publish(content.id, None, None).await.unwrap();

    let types: Vec<String> = (0..3).map(|_| rx.try_recv().unwrap().event_type).collect();
    assert_eq!(types, vec![EVENT_CREATED, EVENT_APPROVED, EVENT_PUBLISHED]);
    assert!(rx.try_recv().is_err());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_rejected_and_no_op_transitions_emit_nothing(pool: PgPool) {
    let (publisher, mut rx) = publisher(&pool);
    let input = tutorial("Generics");
    let (content, _) = publisher.create_content(&input).await.unwrap();
    rx.try_recv().unwrap();

    let result = publisher.publish(content.id, None, None).await;
    assert_matches!(result, Err(DbError::Core(CoreError::InvalidTransition { .. })));

    publisher
        .save_draft(
            content.id,
            &DraftInput {
                title: input.title.clone(),
                body: input.body.clone(),
                author_id: None,
            },
        )
        .await
        .unwrap();

    assert!(rx.try_recv().is_err());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_publish_then_reindex_clears_flags(pool: PgPool) {
    let (publisher, _rx) = publisher(&pool);
    let indexer = Arc::new(MemoryIndexer::new());

    let (content, revision) = publisher.create_content(&tutorial("Closures")).await.unwrap();
    publisher.approve(content.id, &revision.hash, None).await.unwrap();
    let published = publisher.publish(content.id, None, None).await.unwrap();
    assert!(published.es_flagged);

    let report = reindexer(&pool, indexer.clone()).run_pass().await.unwrap();
    assert_eq!(report.indexed, 1);

    let doc = indexer.get(content.id).unwrap();
    assert_eq!(doc.revision_hash, revision.hash);
    assert_eq!(doc.text, "Setup Install the toolchain.");

    let stored = ContentRepo::find_by_id(&pool, content.id).await.unwrap().unwrap();
    assert!(!stored.es_flagged);
    assert!(stored.es_already_indexed);

    // Nothing flagged: a second pass changes nothing.
    let report = reindexer(&pool, indexer.clone()).run_pass().await.unwrap();
    assert_eq!(report.seen, 0);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_draft_edit_after_publish_does_not_reindex(pool: PgPool) {
    let (publisher, mut rx) = publisher(&pool);
    let indexer = Arc::new(MemoryIndexer::new());

    let opinion = CreateContent {
        content_type: ContentType::Opinion,
        title: "Tabs or spaces".to_string(),
        body: "Spaces.".to_string(),
        author_id: None,
    };
    let (content, first) = publisher.create_content(&opinion).await.unwrap();
    publisher.publish(content.id, None, None).await.unwrap();
    reindexer(&pool, indexer.clone()).run_pass().await.unwrap();
    while rx.try_recv().is_ok() {}

    let (edited, second) = publisher
        .save_draft(
            content.id,
            &DraftInput {
                title: "Tabs or spaces".to_string(),
                body: "Tabs, actually.".to_string(),
                author_id: None,
            },
        )
        .await
        .unwrap();

    let event = rx.try_recv().unwrap();
    assert_eq!(event.event_type, EVENT_DRAFT_SAVED);
    assert!(!event.triggers_reindex());
    assert_eq!(edited.sha_draft.as_deref(), Some(second.hash.as_str()));
    assert_eq!(edited.sha_public.as_deref(), Some(first.hash.as_str()));
    assert!(!edited.es_flagged);
    assert_eq!(ContentRepo::count_flagged(&pool).await.unwrap(), 0);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_events_are_persisted(pool: PgPool) {
    let bus = Arc::new(EventBus::default());
    let persistence = tokio::spawn(EventPersistence::run(pool.clone(), bus.subscribe()));
    let publisher = Publisher::new(pool.clone(), Arc::clone(&bus), PublicationPolicy::default());

    let (content, revision) = publisher.create_content(&tutorial("Iterators")).await.unwrap();
    publisher.approve(content.id, &revision.hash, None).await.unwrap();

    drop(publisher);
    drop(bus);
    persistence.await.unwrap();

    let history = ContentEventRepo::list_by_content(&pool, content.id).await.unwrap();
    let types: Vec<_> = history.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(types, vec![EVENT_CREATED, EVENT_APPROVED]);
    assert_eq!(history[1].revision_hash.as_deref(), Some(revision.hash.as_str()));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_configured_policy_lets_articles_skip_validation(pool: PgPool) {
    let config = WorkerConfig::from_lookup(|key| match key {
        "DATABASE_URL" => Some("postgres://localhost/zds".to_string()),
        "PUBLISH_WITHOUT_VALIDATION" => Some("article".to_string()),
        _ => None,
    })
    .unwrap();
    let publisher = Publisher::new(
        pool.clone(),
        Arc::new(EventBus::default()),
        config.publication_policy(),
    );

    let article = CreateContent {
        content_type: ContentType::Article,
        title: "Release notes".to_string(),
        body: "What changed.".to_string(),
        author_id: None,
    };
    let (content, draft) = publisher.create_content(&article).await.unwrap();
    let published = publisher.publish(content.id, None, None).await.unwrap();
    assert_eq!(published.sha_public.as_deref(), Some(draft.hash.as_str()));
    assert!(published.es_flagged);

    // Opinions are no longer in the list, so they need an approved revision.
    let opinion = CreateContent {
        content_type: ContentType::Opinion,
        ..article
    };
    let (content, _) = publisher.create_content(&opinion).await.unwrap();
    let result = publisher.publish(content.id, None, None).await;
    assert_matches!(result, Err(DbError::Core(CoreError::InvalidTransition { .. })));
}
