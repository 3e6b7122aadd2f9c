use std::sync::Arc;

use async_trait::async_trait;
use dialog_flow::{Context, FlowError, Result, StepHandler, StepResult, Transition};
use tracing::info;

use crate::collaborators::CustomerDirectory;
use crate::extract;
use crate::markers::{self, AskField};

use super::{Step, session_keys, utils};

/// Collects the city and completes registration through the directory.
pub struct CollectCityStep {
    directory: Arc<dyn CustomerDirectory>,
}

impl CollectCityStep {
    pub fn new(directory: Arc<dyn CustomerDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl StepHandler<Step> for CollectCityStep {
    async fn run(&self, context: Context) -> Result<StepResult<Step>> {
        let user_input: String = context
            .get(session_keys::USER_INPUT)
            .await
            .ok_or_else(|| FlowError::MissingContext("user_input".to_string()))?;
        let raw = user_input.trim();

        // Name is only stored after validation, so a missing name means the
        // user never provided one; regress rather than guess.
        let Some(name) = context.get::<String>(session_keys::CUSTOMER_NAME).await else {
            let reply = format!(
                "I need your name first. Please tell me your full name (e.g., Amit Sharma).\n{}",
                markers::ask(AskField::Name)
            );
            return Ok(StepResult::new(Some(reply), Transition::To(Step::GetName)));
        };

        // Registration is keyed by phone.
        let Some(phone) = context.get::<String>(session_keys::CUSTOMER_PHONE).await else {
            let reply = format!(
                "Could you please confirm your 10-digit phone number first?\n{}",
                markers::ask(AskField::Phone)
            );
            return Ok(StepResult::new(
                Some(reply),
                Transition::To(Step::WaitingForPhone),
            ));
        };

        if extract::looks_like_amount_or_noise(raw) || !extract::is_probable_city(raw) {
            let reply = format!(
                "That doesn't look like a city name. Which city do you live in? \
                 (e.g., Mumbai, Pune)\n{}",
                markers::ask(AskField::City)
            );
            return Ok(StepResult::new(Some(reply), Transition::Stay));
        }

        info!(phone = %phone, name = %name, city = raw, "registering new customer");

        let profile = self
            .directory
            .create(&phone, &name, raw)
            .await
            .map_err(|e| FlowError::StepFailed(format!("profile creation failed: {e}")))?;

        if let Some(address) = &profile.address {
            context.set(session_keys::CUSTOMER_ADDRESS, address).await;
        }
        context
            .set(session_keys::PRE_APPROVED_LIMIT, profile.pre_approved_limit)
            .await;

        let reply = utils::loan_offer_reply("🎉 Registration complete!", &profile);
        Ok(StepResult::with_status(
            Some(reply),
            Transition::To(Step::GetLoanPurpose),
            format!("registered {} in {}", profile.name, profile.city),
        ))
    }
}
