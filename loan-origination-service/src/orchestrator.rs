//! Dialogue orchestrator: the single entry point for one user turn.
//!
//! Combines session recovery, the global reset interrupt, duplicate-message
//! replay, the state machine dispatch and transcript persistence.

use std::sync::Arc;

use dialog_flow::{
    Context, FlowState, MessageRole, Result, SerializableMessage, Session, SessionStorage,
    StateMachine, StateMachineBuilder, TurnStatus,
};
use tracing::{error, info};

use crate::collaborators::{CompletionService, CustomerDirectory, SanctionLetters, SlipStore};
use crate::extract;
use crate::recovery;
use crate::steps::{
    CollectCityStep, CollectNameStep, CollectPhoneStep, ConfirmDealStep, DoneStep,
    FinalOutcomeStep, GreetStep, LoanPurposeStep, SalesStep, Step, UnderwritingStep, VerifyStep,
    session_keys,
};

/// External collaborators the dialogue depends on.
pub struct Collaborators {
    pub directory: Arc<dyn CustomerDirectory>,
    pub slips: Arc<dyn SlipStore>,
    pub letters: Arc<dyn SanctionLetters>,
    pub completion: Arc<dyn CompletionService>,
}

/// Reply sent when a collaborator fails mid-turn. The stored step is left
/// untouched so the next message retries the same state.
pub const APOLOGY_REPLY: &str =
    "Sorry, something went wrong on our side. Please send that again in a moment.";

const RESET_REPLY: &str = "🔄 Conversation reset. How can I help you today?";

const FALLBACK_REPLY: &str = "How can I help you with your loan application?";

pub struct DialogueOrchestrator {
    machine: Arc<StateMachine<Step>>,
    sessions: Arc<dyn SessionStorage<Step>>,
}

impl DialogueOrchestrator {
    pub fn new(collaborators: Collaborators, sessions: Arc<dyn SessionStorage<Step>>) -> Self {
        Self {
            machine: Arc::new(build_machine(&collaborators)),
            sessions,
        }
    }

    /// Process one user turn and return the reply text.
    ///
    /// `transcript_so_far` is consulted only when no durable session record
    /// exists; the recovery engine rebuilds step and fields from it. The
    /// caller is expected to serialize turns per session id.
    pub async fn handle_turn(
        &self,
        session_id: &str,
        message: &str,
        transcript_so_far: Option<&[SerializableMessage]>,
        tenure_override: Option<u32>,
    ) -> Result<String> {
        let mut session = match self.sessions.get(session_id).await? {
            Some(session) => session,
            None => self.rebuild_session(session_id, transcript_so_far).await,
        };

        // Exact duplicate of the last human message: replay the prior reply
        // instead of re-running the machine (avoids double side effects such
        // as a second sanction letter).
        let transcript = session.context.get_all_messages().await;
        if let Some(prior) = duplicate_reply(&transcript, message) {
            info!(session_id, "duplicate resubmission, replaying prior reply");
            return Ok(prior);
        }

        // Global interrupt: reset clears every customer fact and returns to
        // the greeting, regardless of the current step.
        if extract::is_reset_request(message) {
            session.context.clear_data().await;
            session.current_step = Step::Greet;
            session.context.add_human_message(message).await;
            session.context.add_assistant_message(RESET_REPLY).await;
            self.sessions.save(session).await?;
            info!(session_id, "session reset");
            return Ok(RESET_REPLY.to_string());
        }

        if let Some(tenure) = tenure_override {
            session.context.set(session_keys::LOAN_TENURE, tenure).await;
        }
        session.context.set(session_keys::USER_INPUT, message).await;
        session.context.set(session_keys::SESSION_ID, session_id).await;

        let step_before = session.current_step;
        let result = match self.machine.handle_turn(&mut session).await {
            Ok(result) => result,
            Err(e) => {
                error!(
                    session_id,
                    step = step_before.name(),
                    error = %e,
                    "turn failed"
                );
                // The mutated session is not saved, so the stored step is
                // preserved and the next message retries it.
                return Ok(APOLOGY_REPLY.to_string());
            }
        };

        let reply = result.reply.unwrap_or_else(|| FALLBACK_REPLY.to_string());

        session.context.add_human_message(message).await;
        session.context.add_assistant_message(&reply).await;
        self.sessions.save(session).await?;

        info!(
            session_id,
            completed = result.status == TurnStatus::Completed,
            "turn handled"
        );
        Ok(reply)
    }

    async fn rebuild_session(
        &self,
        session_id: &str,
        transcript: Option<&[SerializableMessage]>,
    ) -> Session<Step> {
        let Some(transcript) = transcript.filter(|t| !t.is_empty()) else {
            return Session::new(session_id, Step::Greet);
        };

        let recovered = recovery::recover(transcript);
        info!(
            session_id,
            step = recovered.step.name(),
            phone = recovered.phone.as_deref().unwrap_or("-"),
            amount = recovered.amount,
            "rebuilt session from transcript"
        );

        let session = Session::new(session_id, recovered.step);
        seed_context(&session.context, &recovered, transcript).await;
        session
    }
}

async fn seed_context(
    context: &Context,
    recovered: &recovery::RecoveredState,
    transcript: &[SerializableMessage],
) {
    context.set_messages(transcript.to_vec()).await;
    if let Some(phone) = &recovered.phone {
        context.set(session_keys::CUSTOMER_PHONE, phone).await;
    }
    if recovered.amount > 0 {
        context.set(session_keys::LOAN_AMOUNT, recovered.amount).await;
    }
}

fn duplicate_reply(transcript: &[SerializableMessage], incoming: &str) -> Option<String> {
    let mut turns = transcript.iter().rev();
    let last = turns.next()?;
    if last.role != MessageRole::Assistant {
        return None;
    }
    let previous = turns.next()?;
    (previous.role == MessageRole::Human && previous.content == incoming)
        .then(|| last.content.clone())
}

fn build_machine(c: &Collaborators) -> StateMachine<Step> {
    StateMachineBuilder::new("loan_application")
        .register(Step::Greet, Arc::new(GreetStep::new(c.completion.clone())))
        .register(Step::WaitingForPhone, Arc::new(CollectPhoneStep))
        .register(Step::Verifying, Arc::new(VerifyStep::new(c.directory.clone())))
        .register(Step::GetName, Arc::new(CollectNameStep))
        .register(Step::GetCity, Arc::new(CollectCityStep::new(c.directory.clone())))
        .register(Step::GetLoanPurpose, Arc::new(LoanPurposeStep))
        .register(Step::Sales, Arc::new(SalesStep))
        .register(Step::ConfirmDeal, Arc::new(ConfirmDealStep))
        .register(
            Step::Underwriting,
            Arc::new(UnderwritingStep::new(
                c.directory.clone(),
                c.slips.clone(),
                c.letters.clone(),
            )),
        )
        .register(
            Step::FinalOutcome,
            Arc::new(FinalOutcomeStep::new(c.directory.clone(), c.letters.clone())),
        )
        .register(Step::Done, Arc::new(DoneStep))
        .build()
}
