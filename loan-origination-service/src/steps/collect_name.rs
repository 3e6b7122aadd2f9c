use async_trait::async_trait;
use dialog_flow::{Context, FlowError, Result, StepHandler, StepResult, Transition};

use crate::extract;
use crate::markers::{self, AskField};

use super::{Step, session_keys};

/// Collects and validates the new customer's full name.
pub struct CollectNameStep;

#[async_trait]
impl StepHandler<Step> for CollectNameStep {
    async fn run(&self, context: Context) -> Result<StepResult<Step>> {
        let user_input: String = context
            .get(session_keys::USER_INPUT)
            .await
            .ok_or_else(|| FlowError::MissingContext("user_input".to_string()))?;
        let raw = user_input.trim();

        if extract::looks_like_amount_or_noise(raw) {
            let reply = format!(
                "Hm, that looks like an amount or some other info. Could you please tell \
                 me your full name (e.g., Amit Sharma)?\n{}",
                markers::ask(AskField::Name)
            );
            return Ok(StepResult::new(Some(reply), Transition::Stay));
        }

        if !extract::is_probable_name(raw) {
            let reply = format!(
                "I didn't get that as your name. Please enter your full name (first and \
                 last name is helpful).\n{}",
                markers::ask(AskField::Name)
            );
            return Ok(StepResult::new(Some(reply), Transition::Stay));
        }

        context.set(session_keys::CUSTOMER_NAME, raw).await;

        let reply = format!(
            "Great! Nice to meet you, {raw}. Which city do you live in?\n{}",
            markers::ask(AskField::City)
        );
        Ok(StepResult::new(Some(reply), Transition::To(Step::GetCity)))
    }
}
