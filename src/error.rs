//! Error types for the session engine.

use thiserror::Error;

/// Result type alias using the engine's error.
pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Bad user input; nothing was changed.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The event is not accepted in the session's current state.
    #[error("cannot {event} while {state}")]
    InvalidTransition {
        event: &'static str,
        state: &'static str,
    },

    #[error("routine `{0}` has no exercises")]
    EmptyRoutine(String),

    #[error("routine `{0}` not found")]
    RoutineNotFound(String),

    /// The session was completed or cancelled; the handle no longer mutates it.
    #[error("session is no longer active")]
    Inactive,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(String),
}

impl EngineError {
    /// True for errors caused by storage I/O rather than by the caller.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            EngineError::Database(_) | EngineError::Serialization(_) | EngineError::Storage(_)
        )
    }
}
