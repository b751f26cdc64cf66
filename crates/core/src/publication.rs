//! Publication state machine and reindex flag rules.
//!
//! A content carries four revision pointers (draft, beta, approved, public)
//! plus an obsolete marker and the search reindex flags. [`apply`] is the
//! only way pointers move: it validates an [`Action`] against the current
//! [`ContentState`] and returns the complete next state. When the action
//! changes what the public sees, the returned state has its reindex flags
//! set in the same value, so a storage layer that writes the state in one
//! row update can never expose public content that is not flagged.
//!
//! Flags are cleared only by [`acknowledge`], the indexer's callback.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::content_type::{ContentType, PublicationPolicy};
use crate::error::CoreError;
use crate::types::{DbId, RevisionHash, Timestamp};

// ---------------------------------------------------------------------------
// Event type names
// ---------------------------------------------------------------------------

pub const EVENT_CREATED: &str = "content.created";
pub const EVENT_DRAFT_SAVED: &str = "content.draft_saved";
pub const EVENT_BETA_OPENED: &str = "content.beta_opened";
pub const EVENT_BETA_CLOSED: &str = "content.beta_closed";
pub const EVENT_APPROVED: &str = "content.approved";
pub const EVENT_PUBLISHED: &str = "content.published";
pub const EVENT_OBSOLETE_SET: &str = "content.obsolete_set";
pub const EVENT_OBSOLETE_CLEARED: &str = "content.obsolete_cleared";
pub const EVENT_UNPUBLISHED: &str = "content.unpublished";

/// Event types emitted by transitions that flag content for reindexing.
pub const REINDEX_EVENTS: &[&str] = &[
    EVENT_APPROVED,
    EVENT_PUBLISHED,
    EVENT_OBSOLETE_SET,
    EVENT_OBSOLETE_CLEARED,
    EVENT_UNPUBLISHED,
];

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Named pointers into a content's revision history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionPointers {
    pub draft: Option<RevisionHash>,
    pub beta: Option<RevisionHash>,
    pub approved: Option<RevisionHash>,
    pub public: Option<RevisionHash>,
}

/// Search reindex bookkeeping stored alongside a content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReindexFlags {
    pub must_reindex: bool,
    pub es_flagged: bool,
    pub es_already_indexed: bool,
    /// When the content was last flagged. Orders the indexer's scan.
    pub flagged_at: Option<Timestamp>,
    /// Bumped every time the content is flagged. An acknowledgment carrying
    /// an older version is stale.
    pub flag_version: i64,
}

/// Everything the state machine needs to know about one content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentState {
    pub content_type: ContentType,
    pub pointers: RevisionPointers,
    pub is_obsolete: bool,
    pub flags: ReindexFlags,
}

impl ContentState {
    /// A freshly authored content whose only revision is the draft.
    pub fn new(content_type: ContentType, draft: impl Into<RevisionHash>) -> Self {
        Self {
            content_type,
            pointers: RevisionPointers {
                draft: Some(draft.into()),
                ..RevisionPointers::default()
            },
            is_obsolete: false,
            flags: ReindexFlags::default(),
        }
    }

    /// Lifecycle state derived from the pointers.
    pub fn publication_state(&self) -> PublicationState {
        PublicationState::of(self)
    }

    fn flag_for_reindex(&mut self, now: Timestamp) {
        self.flags.must_reindex = true;
        self.flags.es_flagged = true;
        self.flags.flagged_at = Some(now);
        self.flags.flag_version += 1;
    }
}

/// Publication lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicationState {
    Draft,
    Beta,
    Validated,
    Published,
    Obsolete,
}

impl PublicationState {
    /// Derive the state from a content's pointers, most visible first.
    pub fn of(content: &ContentState) -> Self {
        let p = &content.pointers;
        if p.public.is_some() {
            if content.is_obsolete {
                PublicationState::Obsolete
            } else {
                PublicationState::Published
            }
        } else if p.approved.is_some() {
            PublicationState::Validated
        } else if p.beta.is_some() {
            PublicationState::Beta
        } else {
            PublicationState::Draft
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PublicationState::Draft => "draft",
            PublicationState::Beta => "beta",
            PublicationState::Validated => "validated",
            PublicationState::Published => "published",
            PublicationState::Obsolete => "obsolete",
        }
    }
}

impl fmt::Display for PublicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// A request to move one or more revision pointers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Record a new working revision. Never touches beta/approved/public.
    SaveDraft { hash: RevisionHash },
    /// Put a revision in public beta.
    OpenBeta { hash: RevisionHash },
    /// End the beta.
    CloseBeta,
    /// A validator approves a specific revision.
    Approve { hash: RevisionHash },
    /// Make a revision public. `None` publishes the approved revision (or
    /// the draft, for types that may skip validation).
    Publish { hash: Option<RevisionHash> },
    /// Mark published content as outdated, or clear the mark.
    SetObsolete(bool),
    /// Withdraw the public revision.
    Unpublish,
}

impl Action {
    /// Short verb used in error messages and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Action::SaveDraft { .. } => "save_draft",
            Action::OpenBeta { .. } => "open_beta",
            Action::CloseBeta => "close_beta",
            Action::Approve { .. } => "approve",
            Action::Publish { .. } => "publish",
            Action::SetObsolete(_) => "set_obsolete",
            Action::Unpublish => "unpublish",
        }
    }

    /// The revision hash the caller named explicitly, if any.
    ///
    /// Storage layers must check that this revision belongs to the content
    /// before persisting the transition.
    pub fn named_hash(&self) -> Option<&str> {
        match self {
            Action::SaveDraft { hash } | Action::OpenBeta { hash } | Action::Approve { hash } => {
                Some(hash)
            }
            Action::Publish { hash } => hash.as_deref(),
            Action::CloseBeta | Action::SetObsolete(_) | Action::Unpublish => None,
        }
    }
}

/// Result of a successful [`apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// The complete state to persist.
    pub state: ContentState,
    /// Event type describing what happened.
    pub event_type: &'static str,
    /// Revision the transition is about (the new draft, the published hash…).
    pub revision_hash: Option<RevisionHash>,
    /// Whether this transition set the reindex flags.
    pub reindex: bool,
    /// `false` when the action was a no-op on the current state.
    pub changed: bool,
}

fn invalid(current: &ContentState, action: &Action, reason: impl Into<String>) -> CoreError {
    CoreError::InvalidTransition {
        state: current.publication_state().as_str(),
        action: action.name(),
        reason: reason.into(),
    }
}

fn require_hash(hash: &str) -> Result<(), CoreError> {
    if hash.trim().is_empty() {
        return Err(CoreError::Validation(
            "Revision hash must not be empty".into(),
        ));
    }
    Ok(())
}

/// Apply `action` to `current`.
///
/// Returns the next state or an error; on error nothing must be written.
pub fn apply(
    current: &ContentState,
    action: &Action,
    policy: &PublicationPolicy,
    now: Timestamp,
) -> Result<Transition, CoreError> {
    if let Some(hash) = action.named_hash() {
        require_hash(hash)?;
    }

    let mut next = current.clone();

    let (event_type, revision_hash, reindex) = match action {
        Action::SaveDraft { hash } => {
            next.pointers.draft = Some(hash.clone());
            (EVENT_DRAFT_SAVED, Some(hash.clone()), false)
        }
        Action::OpenBeta { hash } => {
            next.pointers.beta = Some(hash.clone());
            (EVENT_BETA_OPENED, Some(hash.clone()), false)
        }
        Action::CloseBeta => {
            let Some(beta) = next.pointers.beta.take() else {
                return Err(invalid(current, action, "content is not in beta"));
            };
            (EVENT_BETA_CLOSED, Some(beta), false)
        }
        Action::Approve { hash } => {
            next.pointers.approved = Some(hash.clone());
            (EVENT_APPROVED, Some(hash.clone()), true)
        }
        Action::Publish { hash } => {
            let requires_validation = policy.requires_validation(current.content_type);
            let target = match (hash, &current.pointers.approved) {
                (Some(h), _) => h.clone(),
                (None, Some(approved)) => approved.clone(),
                (None, None) if !requires_validation => match &current.pointers.draft {
                    Some(draft) => draft.clone(),
                    None => return Err(invalid(current, action, "content has no draft")),
                },
                (None, None) => {
                    return Err(invalid(current, action, "no approved revision to publish"))
                }
            };
            if requires_validation && current.pointers.approved.as_deref() != Some(&target) {
                return Err(invalid(
                    current,
                    action,
                    format!(
                        "revision {target} was never approved and {} requires validation",
                        current.content_type
                    ),
                ));
            }
            next.pointers.public = Some(target.clone());
            (EVENT_PUBLISHED, Some(target), true)
        }
        Action::SetObsolete(obsolete) => {
            if current.pointers.public.is_none() {
                return Err(invalid(current, action, "only published content can be obsolete"));
            }
            if current.is_obsolete == *obsolete {
                return Ok(Transition {
                    state: next,
                    event_type: if *obsolete {
                        EVENT_OBSOLETE_SET
                    } else {
                        EVENT_OBSOLETE_CLEARED
                    },
                    revision_hash: current.pointers.public.clone(),
                    reindex: false,
                    changed: false,
                });
            }
            next.is_obsolete = *obsolete;
            let event = if *obsolete {
                EVENT_OBSOLETE_SET
            } else {
                EVENT_OBSOLETE_CLEARED
            };
            (event, current.pointers.public.clone(), true)
        }
        Action::Unpublish => {
            let Some(public) = next.pointers.public.take() else {
                return Err(invalid(current, action, "content is not published"));
            };
            next.is_obsolete = false;
            (EVENT_UNPUBLISHED, Some(public), true)
        }
    };

    if reindex {
        next.flag_for_reindex(now);
    }

    let changed = next != *current;
    Ok(Transition {
        state: next,
        event_type,
        revision_hash,
        reindex,
        changed,
    })
}

// ---------------------------------------------------------------------------
// Indexer acknowledgment
// ---------------------------------------------------------------------------

/// What the indexer read for one flagged content.
///
/// Handed back on acknowledgment so the flag is cleared only if nothing
/// changed in between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexTicket {
    pub content_id: DbId,
    /// The public revision that was indexed; `None` means the entry was removed.
    pub revision_hash: Option<RevisionHash>,
    /// `flag_version` of the content when the indexer read it.
    pub flag_version: i64,
}

/// Clear the reindex flags after a successful indexing of `ticket`.
///
/// Returns `None` when the acknowledgment does not apply: the content is not
/// flagged, its public revision moved, or it was flagged again after the
/// ticket was read (its flag version differs). The caller keeps the stored state in that case and the
/// next pass picks the content up again.
pub fn acknowledge(current: &ContentState, ticket: &IndexTicket) -> Option<ContentState> {
    if !current.flags.es_flagged {
        return None;
    }
    if current.pointers.public != ticket.revision_hash {
        return None;
    }
    if current.flags.flag_version != ticket.flag_version {
        return None;
    }

    let mut next = current.clone();
    next.flags.es_flagged = false;
    next.flags.must_reindex = false;
    next.flags.flagged_at = None;
    next.flags.es_already_indexed = ticket.revision_hash.is_some();
    Some(next)
}
