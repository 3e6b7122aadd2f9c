use dialog_flow::Context;

use crate::collaborators::CustomerProfile;
use crate::markers::{self, OfferCard, SummaryCard};
use crate::underwriting::{
    ANNUAL_INTEREST_RATE_PCT, DEFAULT_TENURE_MONTHS, MAX_TENURE_MONTHS, calculate_emi,
};

use super::session_keys;

/// Tenure to quote with, falling back to the standard 12 months.
pub async fn tenure_months(context: &Context) -> u32 {
    context
        .get(session_keys::LOAN_TENURE)
        .await
        .unwrap_or(DEFAULT_TENURE_MONTHS)
}

/// KYC-success / registration reply carrying the structured offer card.
pub fn loan_offer_reply(headline: &str, profile: &CustomerProfile) -> String {
    let card = markers::offer(&OfferCard {
        pre_approved_limit: profile.pre_approved_limit,
        interest_rate: ANNUAL_INTEREST_RATE_PCT,
        max_tenure: MAX_TENURE_MONTHS,
    });
    let address = profile.address.as_deref().unwrap_or("Address not on file");

    format!(
        "{card}\n{headline}\n\n\
         Name: {name}\n\
         Address on file: {address}\n\
         Credit score: {score}\n\
         Pre-approved limit: ₹{limit}\n\n\
         Congratulations! You're pre-approved for a personal loan.\n\n\
         Please tell me:\n\
         1. How much loan do you need?\n\
         2. What is the purpose? (e.g., Wedding, Medical, Travel, Home Renovation, Education)",
        name = profile.name,
        score = profile.credit_score,
        limit = profile.pre_approved_limit,
    )
}

/// EMI preview reply carrying the structured summary card.
pub fn loan_summary_reply(amount: i64, tenure: u32, purpose: Option<&str>) -> String {
    let emi = calculate_emi(amount, ANNUAL_INTEREST_RATE_PCT, tenure);
    let card = markers::summary(&SummaryCard {
        amount,
        interest_rate: ANNUAL_INTEREST_RATE_PCT,
        tenure,
        emi,
    });
    let purpose_line = purpose
        .map(|p| format!("\nFor your {p} needs, this is a great fit."))
        .unwrap_or_default();

    format!(
        "{card}\nLoan Summary\n\n\
         Amount: ₹{amount}\n\
         Interest rate: {ANNUAL_INTEREST_RATE_PCT}% p.a.\n\
         Tenure: {tenure} months\n\
         Est. EMI: ₹{emi:.2}/month{purpose_line}\n\n\
         Ready to proceed? (yes/no)"
    )
}
