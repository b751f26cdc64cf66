use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// The requested action is not allowed from the content's current state.
    #[error("Cannot {action} content in state {state}: {reason}")]
    InvalidTransition {
        state: &'static str,
        action: &'static str,
        reason: String,
    },

    #[error("Conflict: {0}")]
    Conflict(String),
}
