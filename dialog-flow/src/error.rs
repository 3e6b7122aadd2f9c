use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    /// No handler registered for the session's current step. Dispatch fails
    /// loudly instead of falling through to a catch-all.
    #[error("no handler registered for step: {0}")]
    UnknownStep(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("context value missing: {0}")]
    MissingContext(String),

    #[error("step execution failed: {0}")]
    StepFailed(String),

    #[error("same-turn dispatch limit exceeded at step: {0}")]
    DispatchLimit(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, FlowError>;
