use std::fmt::Debug;
use std::hash::Hash;

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{context::Context, error::Result};

/// The finite set of states a dialogue machine can be in.
///
/// Implementors are plain fieldless enums; the machine keys its handler
/// registry on the enum value, so there is no stringly-typed dispatch.
pub trait FlowState:
    Copy + Eq + Hash + Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Stable wire name of the state.
    fn name(&self) -> &'static str;

    /// Terminal states end the dialogue; the machine reports `Completed`
    /// once the session lands on one.
    fn is_terminal(&self) -> bool {
        false
    }
}

/// Where the machine goes after a handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition<S> {
    /// Stay on the current step and wait for the next user message.
    Stay,
    /// Move to the given step and wait for the next user message.
    To(S),
    /// Move to the given step and run its handler within the same turn.
    Dispatch(S),
}

/// Result of a single handler invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult<S> {
    /// Reply to send to the user, if any.
    pub reply: Option<String>,
    pub next: Transition<S>,
    /// Short progress note for logs and session inspection.
    pub status_message: Option<String>,
}

impl<S> StepResult<S> {
    pub fn new(reply: Option<String>, next: Transition<S>) -> Self {
        Self {
            reply,
            next,
            status_message: None,
        }
    }

    pub fn with_status(
        reply: Option<String>,
        next: Transition<S>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            reply,
            next,
            status_message: Some(status.into()),
        }
    }
}

/// Handler for one dialogue state.
#[async_trait]
pub trait StepHandler<S: FlowState>: Send + Sync {
    async fn run(&self, context: Context) -> Result<StepResult<S>>;
}
