//! Publication service: applies content transitions and announces them.
//!
//! Every method commits through [`ContentRepo`] first and only then
//! publishes a [`ContentEvent`], so subscribers never see an event for a
//! transition that was rolled back. No-op transitions publish nothing.

use std::sync::Arc;

use zds_core::content_type::PublicationPolicy;
use zds_core::publication::{Action, EVENT_CREATED};
use zds_core::types::DbId;
use zds_db::models::content::{Content, CreateContent};
use zds_db::models::revision::{DraftInput, Revision};
use zds_db::repositories::content_repo::TransitionOutcome;
use zds_db::repositories::ContentRepo;
use zds_db::{DbError, DbPool};
use zds_events::{ContentEvent, EventBus};

pub struct Publisher {
    pool: DbPool,
    bus: Arc<EventBus>,
    policy: PublicationPolicy,
}

impl Publisher {
    pub fn new(pool: DbPool, bus: Arc<EventBus>, policy: PublicationPolicy) -> Self {
        Self { pool, bus, policy }
    }

    pub fn policy(&self) -> &PublicationPolicy {
        &self.policy
    }

    /// Author a new content. Its first revision becomes the draft.
    pub async fn create_content(
        &self,
        input: &CreateContent,
    ) -> Result<(Content, Revision), DbError> {
        let (content, revision) = ContentRepo::create(&self.pool, input).await?;

        let mut event = ContentEvent::new(EVENT_CREATED, content.id)
            .with_revision(revision.hash.clone())
            .with_payload(serde_json::json!({
                "content_type": content.content_type,
                "slug": content.slug,
            }));
        if let Some(author) = input.author_id {
            event = event.with_actor(author);
        }
        self.bus.publish(event);

        Ok((content, revision))
    }

    /// Save a new working revision. Public, beta and approved revisions are
    /// untouched.
    pub async fn save_draft(
        &self,
        content_id: DbId,
        input: &DraftInput,
    ) -> Result<(Content, Revision), DbError> {
        let (outcome, revision) = ContentRepo::save_draft(&self.pool, content_id, input).await?;
        let content = self.announce(content_id, outcome, input.author_id);
        Ok((content, revision))
    }

    pub async fn open_beta(
        &self,
        content_id: DbId,
        hash: &str,
        actor: Option<DbId>,
    ) -> Result<Content, DbError> {
        self.run(content_id, Action::OpenBeta { hash: hash.into() }, actor)
            .await
    }

    pub async fn close_beta(&self, content_id: DbId, actor: Option<DbId>) -> Result<Content, DbError> {
        self.run(content_id, Action::CloseBeta, actor).await
    }

    /// Record a validator's approval of `hash`.
    pub async fn approve(
        &self,
        content_id: DbId,
        hash: &str,
        actor: Option<DbId>,
    ) -> Result<Content, DbError> {
        self.run(content_id, Action::Approve { hash: hash.into() }, actor)
            .await
    }

    /// Make a revision public. Without `hash` the approved revision is
    /// published, or the draft for types the policy lets skip validation.
    pub async fn publish(
        &self,
        content_id: DbId,
        hash: Option<&str>,
        actor: Option<DbId>,
    ) -> Result<Content, DbError> {
        let action = Action::Publish {
            hash: hash.map(str::to_string),
        };
        self.run(content_id, action, actor).await
    }

    pub async fn set_obsolete(
        &self,
        content_id: DbId,
        obsolete: bool,
        actor: Option<DbId>,
    ) -> Result<Content, DbError> {
        self.run(content_id, Action::SetObsolete(obsolete), actor)
            .await
    }

    pub async fn unpublish(&self, content_id: DbId, actor: Option<DbId>) -> Result<Content, DbError> {
        self.run(content_id, Action::Unpublish, actor).await
    }

    async fn run(
        &self,
        content_id: DbId,
        action: Action,
        actor: Option<DbId>,
    ) -> Result<Content, DbError> {
        let outcome = ContentRepo::transition(&self.pool, content_id, &action, &self.policy).await?;
        Ok(self.announce(content_id, outcome, actor))
    }

    fn announce(&self, content_id: DbId, outcome: TransitionOutcome, actor: Option<DbId>) -> Content {
        if outcome.transition.changed {
            let mut event = ContentEvent::from_transition(content_id, &outcome.transition);
            if let Some(actor) = actor {
                event = event.with_actor(actor);
            }
            self.bus.publish(event);
        }
        outcome.content
    }
}
