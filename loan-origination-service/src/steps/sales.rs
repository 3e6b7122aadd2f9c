use async_trait::async_trait;
use dialog_flow::{Context, FlowError, Result, StepHandler, StepResult, Transition};

use crate::extract;
use crate::markers::{self, AskField};

use super::{Step, session_keys, utils};

/// Captures (or re-captures) the loan amount and presents the EMI preview.
pub struct SalesStep;

#[async_trait]
impl StepHandler<Step> for SalesStep {
    async fn run(&self, context: Context) -> Result<StepResult<Step>> {
        let user_input: String = context
            .get(session_keys::USER_INPUT)
            .await
            .ok_or_else(|| FlowError::MissingContext("user_input".to_string()))?;

        let amount = extract::parse_loan_amount(&user_input);
        let amount = if extract::is_phone_shaped(amount) { 0 } else { amount };

        if amount == 0 {
            let reply = format!(
                "Enter loan amount (e.g., 2 lakh, 50000).\n{}",
                markers::ask(AskField::Amount)
            );
            return Ok(StepResult::new(Some(reply), Transition::Stay));
        }

        context.set(session_keys::LOAN_AMOUNT, amount).await;

        let tenure = utils::tenure_months(&context).await;
        let purpose: Option<String> = context.get(session_keys::LOAN_PURPOSE).await;
        let reply = utils::loan_summary_reply(amount, tenure, purpose.as_deref());

        Ok(StepResult::with_status(
            Some(reply),
            Transition::To(Step::ConfirmDeal),
            format!("quoting ₹{amount}"),
        ))
    }
}
