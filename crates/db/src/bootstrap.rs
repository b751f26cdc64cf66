//! One-shot checks run during process initialization.

use crate::repositories::MemberRepo;
use crate::DbPool;

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("Required member accounts are missing: {}", .0.join(", "))]
    MissingMembers(Vec<String>),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Check that every account in `usernames` exists.
///
/// The platform attributes automated actions (bot), anonymized content
/// (anonymous) and imported content (external) to these accounts, so they
/// must be present before any worker starts.
pub async fn verify_required_members(
    pool: &DbPool,
    usernames: &[String],
) -> Result<(), BootstrapError> {
    if usernames.is_empty() {
        return Ok(());
    }

    let missing = MemberRepo::find_missing(pool, usernames).await?;
    if !missing.is_empty() {
        return Err(BootstrapError::MissingMembers(missing));
    }

    tracing::debug!(count = usernames.len(), "Required member accounts present");
    Ok(())
}
