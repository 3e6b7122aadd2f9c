//! FlowRunner – convenience wrapper that loads a session, processes exactly
//! **one** user turn, and persists the updated session back to storage.
//!
//! Interactive services usually want one turn per request with the session
//! saved for the next roundtrip; `FlowRunner` makes that a one-liner. Callers
//! that need custom persistence (optimistic locking, batch saves) can use
//! `StateMachine::handle_turn` directly.

use std::sync::Arc;

use crate::{
    error::{FlowError, Result},
    machine::{StateMachine, TurnResult},
    step::FlowState,
    storage::SessionStorage,
};

/// High-level helper that orchestrates the common _load → handle → save_
/// pattern.
#[derive(Clone)]
pub struct FlowRunner<S: FlowState> {
    machine: Arc<StateMachine<S>>,
    storage: Arc<dyn SessionStorage<S>>,
}

impl<S: FlowState> FlowRunner<S> {
    pub fn new(machine: Arc<StateMachine<S>>, storage: Arc<dyn SessionStorage<S>>) -> Self {
        Self { machine, storage }
    }

    /// Process exactly one user turn for the given `session_id` and persist
    /// the updated session.
    pub async fn run(&self, session_id: &str) -> Result<TurnResult> {
        let mut session = self
            .storage
            .get(session_id)
            .await?
            .ok_or_else(|| FlowError::SessionNotFound(session_id.to_string()))?;

        let result = self.machine.handle_turn(&mut session).await?;

        self.storage.save(session).await?;

        Ok(result)
    }
}
