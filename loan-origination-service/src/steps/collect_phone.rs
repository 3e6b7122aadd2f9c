use async_trait::async_trait;
use dialog_flow::{Context, FlowError, Result, StepHandler, StepResult, Transition};

use crate::extract;
use crate::markers::{self, AskField};

use super::{Step, session_keys};

/// Waits for a valid 10-digit phone number and hands off to verification.
pub struct CollectPhoneStep;

#[async_trait]
impl StepHandler<Step> for CollectPhoneStep {
    async fn run(&self, context: Context) -> Result<StepResult<Step>> {
        let user_input: String = context
            .get(session_keys::USER_INPUT)
            .await
            .ok_or_else(|| FlowError::MissingContext("user_input".to_string()))?;

        if extract::parse_phone(&user_input).is_some() {
            return Ok(StepResult::new(None, Transition::Dispatch(Step::Verifying)));
        }

        let digit_count = extract::digit_count(&user_input);
        let reply = if digit_count > 0 {
            let plural = if digit_count == 1 { "" } else { "s" };
            format!(
                "I need exactly 10 digits. You entered {digit_count} digit{plural}. \
                 Please enter your complete phone number.\n{}",
                markers::ask(AskField::Phone)
            )
        } else {
            format!(
                "Please provide a valid 10-digit phone number.\n{}",
                markers::ask(AskField::Phone)
            )
        };

        Ok(StepResult::new(Some(reply), Transition::Stay))
    }
}
