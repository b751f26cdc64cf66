//! Validation and slug helpers for authored content.

use crate::error::CoreError;

/// Maximum length of a content title.
pub const MAX_TITLE_LENGTH: usize = 200;

/// Maximum length of a revision body.
pub const MAX_BODY_LENGTH: usize = 1_000_000;

/// Generate a URL-safe slug from a title.
///
/// Lowercases, replaces anything that is not ASCII alphanumeric with a
/// hyphen, collapses consecutive hyphens and trims them at both ends.
pub fn generate_slug(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut prev_hyphen = false;
    for c in title.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            prev_hyphen = false;
        } else if !prev_hyphen {
            slug.push('-');
            prev_hyphen = true;
        }
    }
    slug.trim_matches('-').to_string()
}

/// Validate a title (non-empty, at most [`MAX_TITLE_LENGTH`] characters).
pub fn validate_title(title: &str) -> Result<(), CoreError> {
    if title.trim().is_empty() {
        return Err(CoreError::Validation("Title must not be empty".into()));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(CoreError::Validation(format!(
            "Title must be at most {MAX_TITLE_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Validate a revision body.
pub fn validate_body(body: &str) -> Result<(), CoreError> {
    if body.len() > MAX_BODY_LENGTH {
        return Err(CoreError::Validation(format!(
            "Body must be at most {MAX_BODY_LENGTH} bytes"
        )));
    }
    Ok(())
}
