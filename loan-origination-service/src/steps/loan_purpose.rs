use async_trait::async_trait;
use dialog_flow::{Context, FlowError, Result, StepHandler, StepResult, Transition};
use tracing::info;

use crate::extract;
use crate::markers::{self, AskField};

use super::{Step, session_keys, utils};

/// Captures loan amount and purpose together for needs analysis.
pub struct LoanPurposeStep;

#[async_trait]
impl StepHandler<Step> for LoanPurposeStep {
    async fn run(&self, context: Context) -> Result<StepResult<Step>> {
        let user_input: String = context
            .get(session_keys::USER_INPUT)
            .await
            .ok_or_else(|| FlowError::MissingContext("user_input".to_string()))?;

        let parsed = extract::parse_loan_amount(&user_input);
        let parsed = if extract::is_phone_shaped(parsed) { 0 } else { parsed };
        // An amount captured in an earlier turn still counts.
        let stored: i64 = context
            .get(session_keys::LOAN_AMOUNT)
            .await
            .unwrap_or_default();
        let amount = if parsed > 0 { parsed } else { stored };

        let purpose = extract::extract_purpose(&user_input);
        let purpose = if purpose.is_empty() {
            context
                .get::<String>(session_keys::LOAN_PURPOSE)
                .await
                .unwrap_or_default()
        } else {
            purpose
        };

        if amount > 0 && !purpose.is_empty() {
            context.set(session_keys::LOAN_AMOUNT, amount).await;
            context.set(session_keys::LOAN_PURPOSE, &purpose).await;
            info!(amount, purpose = %purpose, "needs analysis complete");

            let tenure = utils::tenure_months(&context).await;
            let reply = format!(
                "Perfect! For your {purpose} needs, here's what I can offer:\n\n{}",
                utils::loan_summary_reply(amount, tenure, Some(&purpose))
            );
            return Ok(StepResult::with_status(
                Some(reply),
                Transition::To(Step::ConfirmDeal),
                format!("quoting ₹{amount} for {purpose}"),
            ));
        }

        if amount > 0 {
            context.set(session_keys::LOAN_AMOUNT, amount).await;
            let reply = format!(
                "Got it! You need ₹{amount}. To help you better, what do you need this \
                 loan for?\n(e.g., Wedding, Medical, Travel, Home Renovation, Education, \
                 Business)\n{}",
                markers::ask(AskField::Purpose)
            );
            return Ok(StepResult::new(Some(reply), Transition::Stay));
        }

        if !purpose.is_empty() {
            context.set(session_keys::LOAN_PURPOSE, &purpose).await;
            let reply = format!(
                "I see you need funds for {purpose}. How much loan amount do you need?\n{}",
                markers::ask(AskField::Amount)
            );
            return Ok(StepResult::new(Some(reply), Transition::Stay));
        }

        let reply = format!(
            "Please share:\n\
             1. Loan amount you need (e.g., 2 lakh, 50000)\n\
             2. Purpose of the loan (e.g., Wedding, Medical, Travel)\n{}",
            markers::ask(AskField::Purpose)
        );
        Ok(StepResult::new(Some(reply), Transition::Stay))
    }
}
