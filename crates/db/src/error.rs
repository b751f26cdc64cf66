use zds_core::error::CoreError;

/// Errors returned by repository operations that apply domain rules.
///
/// Plain CRUD methods return `sqlx::Error` directly.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A domain rule rejected the operation; nothing was written.
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}
