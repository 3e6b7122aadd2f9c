use std::sync::Arc;

use async_trait::async_trait;
use dialog_flow::{Context, FlowError, Result, StepHandler, StepResult, Transition};
use tracing::info;

use crate::collaborators::{CustomerDirectory, SanctionLetters, SanctionRequest, SlipStore};
use crate::extract;
use crate::markers::{self, ApprovalCard, AskField, RejectionCard};
use crate::underwriting::{self, UnderwritingOutcome, UnderwritingStatus};

use super::{Step, session_keys, utils};

const PROCESSING_NOTE: &str = "👍 Got your file. Processing your salary slip now...";

/// Runs the underwriting engine, including the salary-slip sub-protocol.
pub struct UnderwritingStep {
    directory: Arc<dyn CustomerDirectory>,
    slips: Arc<dyn SlipStore>,
    letters: Arc<dyn SanctionLetters>,
}

impl UnderwritingStep {
    pub fn new(
        directory: Arc<dyn CustomerDirectory>,
        slips: Arc<dyn SlipStore>,
        letters: Arc<dyn SanctionLetters>,
    ) -> Self {
        Self {
            directory,
            slips,
            letters,
        }
    }
}

#[async_trait]
impl StepHandler<Step> for UnderwritingStep {
    async fn run(&self, context: Context) -> Result<StepResult<Step>> {
        let user_input: String = context
            .get(session_keys::USER_INPUT)
            .await
            .unwrap_or_default();

        let phone: Option<String> = context.get(session_keys::CUSTOMER_PHONE).await;
        let amount: i64 = context
            .get(session_keys::LOAN_AMOUNT)
            .await
            .unwrap_or_default();
        let tenure = utils::tenure_months(&context).await;

        let claims_upload = extract::is_upload_claim(&user_input);
        let file_present = match phone.as_deref() {
            Some(phone) => self.slips.exists(phone).await,
            None => false,
        };

        info!(
            phone = phone.as_deref().unwrap_or("-"),
            amount, claims_upload, file_present, "underwriting turn"
        );

        // Claimed upload with no file on record never reaches the engine.
        if claims_upload && !file_present {
            let reply = if phone.is_none() {
                format!(
                    "Thanks, I see you said uploaded, but I can't find your file on the \
                     server.\n\nPlease re-upload your salary slip (make sure the upload \
                     finishes), or type the 10-digit phone number you used to upload so I \
                     can look it up.\n{}",
                    markers::ask(AskField::SlipUpload)
                )
            } else {
                format!(
                    "I see you said uploaded, but your salary slip is not yet available \
                     on the server.\n\nPlease re-upload the salary slip (ensure the upload \
                     completes) and try again.\n{}",
                    markers::ask(AskField::SlipUpload)
                )
            };
            return Ok(StepResult::new(Some(reply), Transition::Stay));
        }

        if file_present {
            // file_present implies the phone is known.
            let phone = phone.clone().unwrap_or_default();
            return self
                .underwrite_with_slip(&context, &phone, amount, tenure)
                .await;
        }

        // No slip on record: sanity-check amount and phone before deciding.
        if amount <= 0 {
            let reply = format!(
                "I need to know the loan amount you require before I can process your \
                 application. How much do you need?\n{}",
                markers::ask(AskField::Amount)
            );
            return Ok(StepResult::new(Some(reply), Transition::To(Step::Sales)));
        }

        let Some(phone) = phone else {
            let reply = format!(
                "Could you please confirm your 10-digit phone number again?\n{}",
                markers::ask(AskField::Phone)
            );
            return Ok(StepResult::new(
                Some(reply),
                Transition::To(Step::WaitingForPhone),
            ));
        };

        let profile = self.lookup_profile(&phone).await?;
        let decision = underwriting::decide(&profile, amount, tenure, false, None);
        context.set(session_keys::FINAL_DECISION, &decision).await;

        present_decision(&context, &decision, &self.directory, &self.letters).await
    }
}

impl UnderwritingStep {
    async fn underwrite_with_slip(
        &self,
        context: &Context,
        phone: &str,
        amount: i64,
        tenure: u32,
    ) -> Result<StepResult<Step>> {
        let salary = self
            .slips
            .extract_salary(phone)
            .await
            .map_err(|e| FlowError::StepFailed(format!("salary extraction failed: {e}")))?;

        if salary <= 0 {
            let reply = format!(
                "{PROCESSING_NOTE}\n\nI tried to extract your salary from the uploaded \
                 file but couldn't find a clear salary amount.\n\nPlease re-upload a \
                 clearer copy of your salary slip and then type `uploaded`.\n{}",
                markers::ask(AskField::SlipUpload)
            );
            return Ok(StepResult::new(Some(reply), Transition::Stay));
        }

        context.set(session_keys::EXTRACTED_SALARY, salary).await;
        info!(phone, salary, "salary extracted from slip");

        // Amount still unknown: surface the salary and collect the amount
        // before deciding.
        if amount <= 0 {
            let reply = format!(
                "{PROCESSING_NOTE}\n\nI found a monthly salary of ₹{salary} in the \
                 document. To continue, please tell me how much loan you need \
                 (e.g., 200000).\n{}",
                markers::ask(AskField::Amount)
            );
            return Ok(StepResult::new(Some(reply), Transition::To(Step::Sales)));
        }

        let profile = self.lookup_profile(phone).await?;
        let decision = underwriting::decide(&profile, amount, tenure, true, Some(salary));
        context.set(session_keys::FINAL_DECISION, &decision).await;

        let mut result =
            present_decision(context, &decision, &self.directory, &self.letters).await?;
        if let Some(reply) = result.reply.take() {
            result.reply = Some(format!("{PROCESSING_NOTE}\n\n{reply}"));
        }
        Ok(result)
    }

    async fn lookup_profile(
        &self,
        phone: &str,
    ) -> Result<crate::collaborators::CustomerProfile> {
        self.directory
            .lookup(phone)
            .await
            .map_err(|e| FlowError::StepFailed(format!("profile lookup failed: {e}")))?
            .ok_or_else(|| FlowError::StepFailed(format!("no customer profile for {phone}")))
    }
}

/// Turn an underwriting decision into the user-facing reply and transition.
///
/// Shared by the underwriting step and the legacy `final_outcome` synthesis
/// path, which replays a stored decision and must behave identically.
pub(crate) async fn present_decision(
    context: &Context,
    decision: &UnderwritingOutcome,
    directory: &Arc<dyn CustomerDirectory>,
    letters: &Arc<dyn SanctionLetters>,
) -> Result<StepResult<Step>> {
    let phone: String = context
        .get(session_keys::CUSTOMER_PHONE)
        .await
        .unwrap_or_default();
    let amount: i64 = context
        .get(session_keys::LOAN_AMOUNT)
        .await
        .unwrap_or_default();
    let tenure = utils::tenure_months(context).await;

    match decision.status {
        UnderwritingStatus::Approved => {
            let emi = decision
                .new_emi
                .ok_or_else(|| FlowError::StepFailed("approved decision without EMI".to_string()))?;

            let customer_name = match context.get::<String>(session_keys::CUSTOMER_NAME).await {
                Some(name) => name,
                None => directory
                    .lookup(&phone)
                    .await
                    .ok()
                    .flatten()
                    .map(|p| p.name)
                    .unwrap_or_else(|| "Customer".to_string()),
            };

            let link = letters
                .generate(&SanctionRequest {
                    customer_name: customer_name.clone(),
                    phone: phone.clone(),
                    amount,
                    emi,
                    tenure_months: tenure,
                })
                .await
                .map_err(|e| {
                    FlowError::StepFailed(format!("sanction letter generation failed: {e}"))
                })?;

            let card = markers::approval(&ApprovalCard {
                name: customer_name.clone(),
                amount,
                emi,
                doc_link: link.clone(),
            });
            let reply = format!(
                "{card}\n🎉 Loan approved!\n\n\
                 Name: {customer_name}\n\
                 Loan amount: ₹{amount}\n\
                 Final EMI: ₹{emi:.2}\n\n\
                 Download your sanction letter: {link}"
            );
            Ok(StepResult::with_status(
                Some(reply),
                Transition::To(Step::Done),
                format!("approved ₹{amount} at EMI ₹{emi:.2}"),
            ))
        }
        UnderwritingStatus::NeedsDocs => {
            let reply = format!(
                "⚠️ Amount above instant limit. Please upload your salary slip to \
                 continue.\n\nOnce uploaded, just reply `uploaded` here and I'll re-check \
                 your eligibility.\n{}",
                markers::ask(AskField::SlipUpload)
            );
            Ok(StepResult::with_status(
                Some(reply),
                Transition::To(Step::Underwriting),
                "income proof required",
            ))
        }
        UnderwritingStatus::SoftReject => {
            let fallback = decision.fallback_offer.ok_or_else(|| {
                FlowError::StepFailed("soft reject without fallback offer".to_string())
            })?;
            context.set(session_keys::LOAN_AMOUNT, fallback).await;

            let reply = format!(
                "I understand you were looking for ₹{amount}, but here's what we can do \
                 right away:\n\n{}",
                utils::loan_summary_reply(fallback, tenure, None)
            );
            Ok(StepResult::with_status(
                Some(reply),
                Transition::To(Step::ConfirmDeal),
                format!("counter-offered ₹{fallback}"),
            ))
        }
        UnderwritingStatus::HardReject => {
            let reason = decision
                .reason
                .clone()
                .unwrap_or_else(|| "Not specified".to_string());
            let credit_score = directory
                .lookup(&phone)
                .await
                .ok()
                .flatten()
                .map(|p| p.credit_score);

            let card = markers::rejection(&RejectionCard {
                reason: reason.clone(),
                credit_score,
            });
            let reply = format!("{card}\n❌ Application rejected.\n\nReason: {reason}");
            Ok(StepResult::with_status(
                Some(reply),
                Transition::To(Step::Done),
                "application rejected",
            ))
        }
    }
}
