use std::sync::Arc;

use async_trait::async_trait;
use dialog_flow::{Context, FlowError, Result, StepHandler, StepResult, Transition};
use tracing::info;

use crate::collaborators::CustomerDirectory;
use crate::extract;
use crate::markers::{self, AskField};

use super::{Step, session_keys, utils};

/// Looks the customer up by phone. Known customers go straight to needs
/// analysis; unknown ones enter registration.
pub struct VerifyStep {
    directory: Arc<dyn CustomerDirectory>,
}

impl VerifyStep {
    pub fn new(directory: Arc<dyn CustomerDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl StepHandler<Step> for VerifyStep {
    async fn run(&self, context: Context) -> Result<StepResult<Step>> {
        let user_input: String = context
            .get(session_keys::USER_INPUT)
            .await
            .ok_or_else(|| FlowError::MissingContext("user_input".to_string()))?;

        // Reached by dispatch after a 10-digit check; anything else regresses
        // to phone collection.
        let Some(phone) = extract::parse_phone(&user_input) else {
            let reply = format!(
                "Please provide a valid 10-digit phone number.\n{}",
                markers::ask(AskField::Phone)
            );
            return Ok(StepResult::new(
                Some(reply),
                Transition::To(Step::WaitingForPhone),
            ));
        };

        info!(phone = %phone, "verifying customer");

        let profile = self
            .directory
            .lookup(&phone)
            .await
            .map_err(|e| FlowError::StepFailed(format!("profile lookup failed: {e}")))?;

        context.set(session_keys::CUSTOMER_PHONE, &phone).await;

        match profile {
            Some(profile) => {
                context.set(session_keys::CUSTOMER_NAME, &profile.name).await;
                if let Some(address) = &profile.address {
                    context.set(session_keys::CUSTOMER_ADDRESS, address).await;
                }
                context
                    .set(session_keys::PRE_APPROVED_LIMIT, profile.pre_approved_limit)
                    .await;

                let reply = utils::loan_offer_reply("✅ KYC verification successful!", &profile);
                Ok(StepResult::with_status(
                    Some(reply),
                    Transition::To(Step::GetLoanPurpose),
                    format!("verified {}", profile.name),
                ))
            }
            None => {
                let reply = format!(
                    "You seem new here. What is your full name?\n{}",
                    markers::ask(AskField::Name)
                );
                Ok(StepResult::with_status(
                    Some(reply),
                    Transition::To(Step::GetName),
                    "new customer, collecting registration details",
                ))
            }
        }
    }
}
