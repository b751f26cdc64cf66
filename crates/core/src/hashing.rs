//! Revision hashing.
//!
//! A revision is identified by the SHA-256 of its parent hash, title and
//! body. Saving the same text on the same parent always yields the same
//! hash, so an unchanged save does not create a new revision.

use sha2::{Digest, Sha256};

/// Compute the hash identifying a revision.
///
/// Each field is length-prefixed so that moving bytes between title and
/// body can never produce the same digest.
pub fn revision_hash(parent: Option<&str>, title: &str, body: &str) -> String {
    let mut hasher = Sha256::new();
    for part in [parent.unwrap_or(""), title, body] {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}
