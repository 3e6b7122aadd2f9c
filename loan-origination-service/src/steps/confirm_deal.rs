use async_trait::async_trait;
use dialog_flow::{Context, FlowError, Result, StepHandler, StepResult, Transition};

use crate::extract;
use crate::markers::{self, AskField};

use super::{Step, session_keys};

/// Yes/no gate in front of underwriting. A first "no" earns a one-time
/// retention nudge before the amount is re-opened.
pub struct ConfirmDealStep;

#[async_trait]
impl StepHandler<Step> for ConfirmDealStep {
    async fn run(&self, context: Context) -> Result<StepResult<Step>> {
        let user_input: String = context
            .get(session_keys::USER_INPUT)
            .await
            .ok_or_else(|| FlowError::MissingContext("user_input".to_string()))?;

        if extract::is_affirmation(&user_input) {
            return Ok(StepResult::new(
                None,
                Transition::Dispatch(Step::Underwriting),
            ));
        }

        if extract::is_negation(&user_input) {
            let offered_discount: bool = context
                .get(session_keys::OFFERED_DISCOUNT)
                .await
                .unwrap_or(false);

            if !offered_discount {
                context.set(session_keys::OFFERED_DISCOUNT, true).await;
                let amount: i64 = context
                    .get(session_keys::LOAN_AMOUNT)
                    .await
                    .unwrap_or_default();
                let reply = format!(
                    "Before you go: with auto-debit we can take 0.5% off the rate. \
                     Shall we proceed with ₹{amount}? (yes/no)\n{}",
                    markers::ask(AskField::Confirmation)
                );
                return Ok(StepResult::new(Some(reply), Transition::Stay));
            }

            let reply = format!("Enter new amount.\n{}", markers::ask(AskField::Amount));
            return Ok(StepResult::new(Some(reply), Transition::To(Step::Sales)));
        }

        let reply = format!(
            "Reply yes to continue or no to change the amount.\n{}",
            markers::ask(AskField::Confirmation)
        );
        Ok(StepResult::new(Some(reply), Transition::Stay))
    }
}
