use std::sync::Arc;

use async_trait::async_trait;
use dialog_flow::{
    Context, FlowError, MessageRole, Result, SerializableMessage, StepHandler, StepResult,
    Transition,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::collaborators::CompletionService;
use crate::extract;
use crate::markers::{self, AskField};

use super::{Step, session_keys};

const CANNED_WELCOME: &str = "Hello! Welcome to the loan desk. I can help with personal loans. \
                              Would you like to check offers or apply now?";

/// Deterministic-first entry state.
///
/// Free-text classification through the completion service is the final
/// fallback only; it may phrase the reply, but side-effecting transitions
/// (verification, registration, underwriting) never run on its say-so.
pub struct GreetStep {
    completion: Arc<dyn CompletionService>,
}

impl GreetStep {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self { completion }
    }
}

/// Shape the completion service may answer with when the user wants to
/// start an application.
#[derive(Deserialize)]
struct SmallTalkDirective {
    assistant_reply: String,
    next_step: Option<String>,
}

#[async_trait]
impl StepHandler<Step> for GreetStep {
    async fn run(&self, context: Context) -> Result<StepResult<Step>> {
        let user_input: String = context
            .get(session_keys::USER_INPUT)
            .await
            .ok_or_else(|| FlowError::MissingContext("user_input".to_string()))?;
        let msg = user_input.to_lowercase();

        // Phone typed directly: verify only on exactly 10 digits.
        let digit_count = extract::digit_count(&user_input);
        if digit_count >= 8 {
            if extract::parse_phone(&user_input).is_some() {
                return Ok(StepResult::new(None, Transition::Dispatch(Step::Verifying)));
            }
            let reply = format!(
                "I need a valid 10-digit phone number. You entered {digit_count} digits. \
                 Please enter your complete phone number.\n{}",
                markers::ask(AskField::Phone)
            );
            return Ok(StepResult::new(Some(reply), Transition::Stay));
        }

        if extract::is_greeting(&msg) {
            return Ok(StepResult::new(
                Some(CANNED_WELCOME.to_string()),
                Transition::Stay,
            ));
        }

        if msg.contains("offer") && !msg.contains("letter") {
            return Ok(StepResult::new(Some(offers_reply()), Transition::Stay));
        }

        // A bare "yes" counts as loan intent only right after an
        // offer/loan mention from our side.
        if extract::is_pure_affirmation(&msg) {
            if let Some(last) = context.last_assistant_message().await {
                let last = last.to_lowercase();
                if last.contains("apply") || last.contains("loan") || last.contains("offer") {
                    let reply = format!(
                        "Great! Let's get started. Please enter your 10-digit phone number \
                         to proceed.\n{}",
                        markers::ask(AskField::Phone)
                    );
                    return Ok(StepResult::new(
                        Some(reply),
                        Transition::To(Step::WaitingForPhone),
                    ));
                }
            }
        }

        // Loan intent with an explicit amount.
        let amount = extract::parse_loan_amount(&user_input);
        if amount > 0 && !extract::is_phone_shaped(amount) && extract::has_loan_intent(&msg) {
            context.set(session_keys::LOAN_AMOUNT, amount).await;
            info!(amount, "captured requested amount at greeting");
            let reply = format!(
                "I can help with ₹{amount}. To check eligibility, please enter your \
                 10-digit phone number.\n{}",
                markers::ask(AskField::Phone)
            );
            return Ok(StepResult::with_status(
                Some(reply),
                Transition::To(Step::WaitingForPhone),
                format!("captured requested amount ₹{amount}"),
            ));
        }

        // Broader loan intent without an amount.
        if extract::mentions_loan_need(&msg) {
            let reply = format!(
                "Excellent! Let's get started with your loan application.\n\n\
                 Please share your 10-digit phone number to proceed.\n{}",
                markers::ask(AskField::Phone)
            );
            return Ok(StepResult::new(
                Some(reply),
                Transition::To(Step::WaitingForPhone),
            ));
        }

        self.small_talk(&context, &user_input).await
    }
}

impl GreetStep {
    async fn small_talk(&self, context: &Context, user_input: &str) -> Result<StepResult<Step>> {
        let history = context.get_last_messages(50).await;
        let prompt = build_small_talk_prompt(&history, user_input);

        let raw = match self.completion.complete(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "completion service unavailable, using canned welcome");
                return Ok(StepResult::new(
                    Some(CANNED_WELCOME.to_string()),
                    Transition::Stay,
                ));
            }
        };

        // The model may answer with a JSON directive; the only transition it
        // can request is asking for the phone number. Anything unparseable
        // is echoed as the reply.
        match serde_json::from_str::<SmallTalkDirective>(raw.trim()) {
            Ok(directive) => {
                let next = match directive.next_step.as_deref() {
                    Some("waiting_for_phone") => Transition::To(Step::WaitingForPhone),
                    _ => Transition::Stay,
                };
                Ok(StepResult::new(Some(directive.assistant_reply), next))
            }
            Err(_) => Ok(StepResult::new(Some(raw), Transition::Stay)),
        }
    }
}

fn offers_reply() -> String {
    let offers = [
        "Festive Bonanza: zero processing fee on all personal loans.",
        "Auto-Pay Special: 0.5% interest rate reduction for auto-debit users.",
        "Express Loan: money in your account in 10 minutes.",
    ];
    format!(
        "Current offers:\n\n{}\n\nWould you like to apply for a personal loan?",
        offers.join("\n")
    )
}

fn build_small_talk_prompt(history: &[SerializableMessage], user_input: &str) -> String {
    let mut rendered = String::new();
    for turn in history {
        let role = match turn.role {
            MessageRole::Human => "User",
            MessageRole::Assistant => "AI",
        };
        rendered.push_str(role);
        rendered.push_str(": ");
        rendered.push_str(&turn.content);
        rendered.push('\n');
    }

    format!(
        r#"You are the assistant for a personal-loan desk.

PAST CONVERSATION:
{rendered}User: {user_input}

INSTRUCTIONS:
- Answer the user's latest message politely in 1-3 sentences.
- Mention current offers if appropriate.
- If the user clearly wants to start a loan application, respond with ONLY this JSON:
  {{"assistant_reply": "<message>", "next_step": "waiting_for_phone"}}
- Otherwise respond with plain text only."#
    )
}
