//! Integration tests for the publication workflow against a real database:
//! - Creating content stores the first revision as draft
//! - Approve then publish sets sha_public and the reindex flags together
//! - Editing published content moves only the draft pointer
//! - Publishing an unapproved revision is rejected without writing anything
//! - Hashes that are not revisions of the content are rejected
//! - Concurrent transitions on one content both land
//! - Revisions cannot be updated

use assert_matches::assert_matches;
use sqlx::PgPool;
use zds_core::content_type::{ContentType, PublicationPolicy};
use zds_core::error::CoreError;
use zds_core::publication::{Action, PublicationState};
use zds_db::models::content::CreateContent;
use zds_db::models::revision::DraftInput;
use zds_db::repositories::content_repo::TransitionOutcome;
use zds_db::repositories::{ContentRepo, RevisionRepo};
use zds_db::DbError;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_content(content_type: ContentType, title: &str) -> CreateContent {
    CreateContent {
        content_type,
        title: title.to_string(),
        body: format!("# {title}\n\nFirst version."),
        author_id: None,
    }
}

fn draft(title: &str, body: &str) -> DraftInput {
    DraftInput {
        title: title.to_string(),
        body: body.to_string(),
        author_id: None,
    }
}

async fn run(pool: &PgPool, id: i64, action: Action) -> Result<TransitionOutcome, DbError> {
    ContentRepo::transition(pool, id, &action, &PublicationPolicy::default()).await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_create_content_sets_draft(pool: PgPool) {
    let (content, revision) =
        ContentRepo::create(&pool, &new_content(ContentType::Tutorial, "Learn Rust"))
            .await
            .unwrap();

    assert!(content.id > 0);
    assert_eq!(content.slug, "learn-rust");
    assert_eq!(content.sha_draft.as_deref(), Some(revision.hash.as_str()));
    assert_eq!(content.sha_public, None);
    assert!(!content.es_flagged);
    assert_eq!(revision.parent_hash, None);
    assert_eq!(content.state().unwrap().publication_state(), PublicationState::Draft);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_approve_then_publish_flags_content(pool: PgPool) {
    let (content, revision) =
        ContentRepo::create(&pool, &new_content(ContentType::Tutorial, "Borrowing"))
            .await
            .unwrap();

    let approved = run(&pool, content.id, Action::Approve { hash: revision.hash.clone() })
        .await
        .unwrap();
    assert_eq!(approved.content.sha_approved.as_deref(), Some(revision.hash.as_str()));
    assert_eq!(approved.content.sha_public, None);

    let published = run(&pool, content.id, Action::Publish { hash: None }).await.unwrap();
    assert_eq!(published.content.sha_public.as_deref(), Some(revision.hash.as_str()));
    assert!(published.content.es_flagged);
    assert!(published.content.must_reindex);
    assert!(published.content.flagged_at.is_some());

    // Re-read to check what was committed.
    let stored = ContentRepo::find_by_id(&pool, content.id).await.unwrap().unwrap();
    assert_eq!(stored.sha_public.as_deref(), Some(revision.hash.as_str()));
    assert!(stored.es_flagged);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_editing_published_content_keeps_public_pointer(pool: PgPool) {
    let (content, first) =
        ContentRepo::create(&pool, &new_content(ContentType::Article, "Lifetimes"))
            .await
            .unwrap();
    run(&pool, content.id, Action::Approve { hash: first.hash.clone() }).await.unwrap();
    let published = run(&pool, content.id, Action::Publish { hash: None }).await.unwrap();

    let (edited, second) = ContentRepo::save_draft(
        &pool,
        content.id,
        &draft("Lifetimes", "Second version."),
    )
    .await
    .unwrap();

    assert_ne!(first.hash, second.hash);
    assert_eq!(second.parent_hash.as_deref(), Some(first.hash.as_str()));
    assert_eq!(edited.content.sha_draft.as_deref(), Some(second.hash.as_str()));
    assert_eq!(edited.content.sha_public.as_deref(), Some(first.hash.as_str()));
    assert_eq!(edited.content.es_flagged, published.content.es_flagged);
    assert_eq!(edited.content.flagged_at, published.content.flagged_at);
    assert!(!edited.transition.reindex);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_saving_identical_draft_is_a_no_op(pool: PgPool) {
    let input = new_content(ContentType::Tutorial, "Traits");
    let (content, first) = ContentRepo::create(&pool, &input).await.unwrap();

    let (outcome, same) = ContentRepo::save_draft(&pool, content.id, &draft(&input.title, &input.body))
        .await
        .unwrap();

    assert_eq!(same.id, first.id);
    assert!(!outcome.transition.changed);
    let revisions = RevisionRepo::list_by_content(&pool, content.id).await.unwrap();
    assert_eq!(revisions.len(), 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_publishing_unapproved_revision_is_rejected(pool: PgPool) {
    let (content, revision) =
        ContentRepo::create(&pool, &new_content(ContentType::Tutorial, "Macros"))
            .await
            .unwrap();

    let result = run(&pool, content.id, Action::Publish { hash: Some(revision.hash.clone()) }).await;
    assert_matches!(result, Err(DbError::Core(CoreError::InvalidTransition { .. })));

    let stored = ContentRepo::find_by_id(&pool, content.id).await.unwrap().unwrap();
    assert_eq!(stored.sha_public, None);
    assert!(!stored.es_flagged);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_opinion_publishes_without_validation(pool: PgPool) {
    let (content, revision) =
        ContentRepo::create(&pool, &new_content(ContentType::Opinion, "Why Rust"))
            .await
            .unwrap();

    let published = run(&pool, content.id, Action::Publish { hash: None }).await.unwrap();
    assert_eq!(published.content.sha_public.as_deref(), Some(revision.hash.as_str()));
    assert_eq!(published.content.sha_approved, None);
    assert!(published.content.es_flagged);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_foreign_hash_is_rejected(pool: PgPool) {
    let (a, _) = ContentRepo::create(&pool, &new_content(ContentType::Tutorial, "A"))
        .await
        .unwrap();
    let (_, b_rev) = ContentRepo::create(&pool, &new_content(ContentType::Tutorial, "B"))
        .await
        .unwrap();

    let result = run(&pool, a.id, Action::Approve { hash: b_rev.hash.clone() }).await;
    assert_matches!(result, Err(DbError::Core(CoreError::Validation(_))));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_unknown_content_is_not_found(pool: PgPool) {
    let result = run(&pool, 999_999, Action::Unpublish).await;
    assert_matches!(
        result,
        Err(DbError::Core(CoreError::NotFound { entity: "content", .. }))
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn test_obsolete_and_unpublish(pool: PgPool) {
    let (content, revision) =
        ContentRepo::create(&pool, &new_content(ContentType::Opinion, "Old news"))
            .await
            .unwrap();
    run(&pool, content.id, Action::Publish { hash: None }).await.unwrap();

    let obsolete = run(&pool, content.id, Action::SetObsolete(true)).await.unwrap();
    assert!(obsolete.content.is_obsolete);
    assert_eq!(obsolete.content.sha_public.as_deref(), Some(revision.hash.as_str()));

    let unpublished = run(&pool, content.id, Action::Unpublish).await.unwrap();
    assert_eq!(unpublished.content.sha_public, None);
    assert!(!unpublished.content.is_obsolete);
    assert!(unpublished.content.es_flagged);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_concurrent_transitions_are_not_lost(pool: PgPool) {
    let (content, revision) =
        ContentRepo::create(&pool, &new_content(ContentType::Opinion, "Hot topic"))
            .await
            .unwrap();
    let published = run(&pool, content.id, Action::Publish { hash: None }).await.unwrap();
    let version = published.content.flag_version;

    let (approved, obsolete) = tokio::join!(
        run(&pool, content.id, Action::Approve { hash: revision.hash.clone() }),
        run(&pool, content.id, Action::SetObsolete(true)),
    );
    approved.unwrap();
    obsolete.unwrap();

    let stored = ContentRepo::find_by_id(&pool, content.id).await.unwrap().unwrap();
    assert_eq!(stored.sha_approved.as_deref(), Some(revision.hash.as_str()));
    assert_eq!(stored.sha_public.as_deref(), Some(revision.hash.as_str()));
    assert!(stored.is_obsolete);
    assert!(stored.es_flagged);
    assert_eq!(stored.flag_version, version + 2);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_revisions_are_immutable(pool: PgPool) {
    let (_, revision) = ContentRepo::create(&pool, &new_content(ContentType::Article, "Fixed"))
        .await
        .unwrap();

    let result = sqlx::query("UPDATE revisions SET body = 'tampered' WHERE id = $1")
        .bind(revision.id)
        .execute(&pool)
        .await;
    assert!(result.is_err(), "revision update must be rejected");

    let stored = RevisionRepo::find_by_hash(&pool, revision.content_id, &revision.hash)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.body, revision.body);
}
