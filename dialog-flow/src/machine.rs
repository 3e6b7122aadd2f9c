use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::{
    error::{FlowError, Result},
    step::{FlowState, StepHandler, Transition},
    storage::Session,
};

/// Upper bound on same-turn `Dispatch` hops; a cycle in the transition
/// table would otherwise spin forever.
const MAX_DISPATCH_HOPS: usize = 8;

/// Outcome of processing one user turn.
#[derive(Debug, Clone)]
pub struct TurnResult {
    pub reply: Option<String>,
    pub status: TurnStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStatus {
    /// Waiting for the next user message.
    WaitingForInput,
    /// The session reached a terminal state.
    Completed,
}

/// An enum-keyed dialogue state machine.
///
/// Each state owns one handler; the handler decides the transition, so the
/// transition table lives in pattern matches rather than edge lists.
pub struct StateMachine<S: FlowState> {
    id: String,
    handlers: HashMap<S, Arc<dyn StepHandler<S>>>,
}

impl<S: FlowState> StateMachine<S> {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            handlers: HashMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn register(&mut self, step: S, handler: Arc<dyn StepHandler<S>>) {
        self.handlers.insert(step, handler);
    }

    /// Process one user turn: run the current step's handler, follow
    /// same-turn dispatches, stop as soon as the machine waits for input.
    ///
    /// An unregistered step is an error, never a silent fall-through.
    pub async fn handle_turn(&self, session: &mut Session<S>) -> Result<TurnResult> {
        let mut reply_parts: Vec<String> = Vec::new();
        let mut hops = 0usize;

        loop {
            let step = session.current_step;
            let handler = self
                .handlers
                .get(&step)
                .ok_or_else(|| FlowError::UnknownStep(step.name().to_string()))?;

            let result = handler.run(session.context.clone()).await?;
            session.status_message = result.status_message.clone();
            debug!(machine = %self.id, step = step.name(), "step handled");

            if let Some(reply) = result.reply {
                reply_parts.push(reply);
            }

            match result.next {
                Transition::Stay => return Ok(self.finish(step, reply_parts)),
                Transition::To(next) => {
                    session.current_step = next;
                    return Ok(self.finish(next, reply_parts));
                }
                Transition::Dispatch(next) => {
                    hops += 1;
                    if hops > MAX_DISPATCH_HOPS {
                        return Err(FlowError::DispatchLimit(next.name().to_string()));
                    }
                    session.current_step = next;
                }
            }
        }
    }

    fn finish(&self, landed_on: S, reply_parts: Vec<String>) -> TurnResult {
        let status = if landed_on.is_terminal() {
            TurnStatus::Completed
        } else {
            TurnStatus::WaitingForInput
        };
        let reply = if reply_parts.is_empty() {
            None
        } else {
            Some(reply_parts.join("\n\n"))
        };
        TurnResult { reply, status }
    }
}

/// Builder for assembling a [`StateMachine`].
pub struct StateMachineBuilder<S: FlowState> {
    machine: StateMachine<S>,
}

impl<S: FlowState> StateMachineBuilder<S> {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            machine: StateMachine::new(id),
        }
    }

    pub fn register(mut self, step: S, handler: Arc<dyn StepHandler<S>>) -> Self {
        self.machine.register(step, handler);
        self
    }

    pub fn build(self) -> StateMachine<S> {
        self.machine
    }
}
