//! Underwriting decision engine: a pure function over the customer profile
//! and the requested terms. Rules are evaluated in strict order; the first
//! match wins.

use serde::{Deserialize, Serialize};

use crate::collaborators::CustomerProfile;

/// Annual interest rate applied to every personal loan quote, percent.
pub const ANNUAL_INTEREST_RATE_PCT: f64 = 12.0;
/// Tenure used when the customer never specified one.
pub const DEFAULT_TENURE_MONTHS: u32 = 12;
/// Longest tenure shown on the pre-approved offer card.
pub const MAX_TENURE_MONTHS: u32 = 60;
/// Minimum bureau score for any approval.
pub const MIN_CREDIT_SCORE: u32 = 700;
/// The EMI may not exceed this share of the verified monthly salary.
pub const MAX_EMI_TO_SALARY: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnderwritingStatus {
    Approved,
    NeedsDocs,
    SoftReject,
    HardReject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnderwritingOutcome {
    pub status: UnderwritingStatus,
    pub new_emi: Option<f64>,
    pub fallback_offer: Option<i64>,
    pub reason: Option<String>,
    pub max_allowed_emi: Option<f64>,
    pub verified_salary: Option<i64>,
}

impl UnderwritingOutcome {
    fn approved(new_emi: f64) -> Self {
        Self {
            status: UnderwritingStatus::Approved,
            new_emi: Some(new_emi),
            fallback_offer: None,
            reason: None,
            max_allowed_emi: None,
            verified_salary: None,
        }
    }

    fn needs_docs(reason: impl Into<String>) -> Self {
        Self {
            status: UnderwritingStatus::NeedsDocs,
            new_emi: None,
            fallback_offer: None,
            reason: Some(reason.into()),
            max_allowed_emi: None,
            verified_salary: None,
        }
    }

    fn soft_reject(fallback_offer: i64, reason: impl Into<String>) -> Self {
        Self {
            status: UnderwritingStatus::SoftReject,
            new_emi: None,
            fallback_offer: Some(fallback_offer),
            reason: Some(reason.into()),
            max_allowed_emi: None,
            verified_salary: None,
        }
    }

    fn hard_reject(reason: impl Into<String>) -> Self {
        Self {
            status: UnderwritingStatus::HardReject,
            new_emi: None,
            fallback_offer: None,
            reason: Some(reason.into()),
            max_allowed_emi: None,
            verified_salary: None,
        }
    }
}

/// Standard amortization EMI, rounded to 2 decimal places. Degenerate
/// inputs collapse sensibly: zero tenure gives 0, zero rate divides the
/// principal evenly.
pub fn calculate_emi(principal: i64, annual_rate_pct: f64, tenure_months: u32) -> f64 {
    if tenure_months == 0 {
        return 0.0;
    }
    let principal = principal as f64;
    let monthly_rate = annual_rate_pct / 1200.0;
    if monthly_rate == 0.0 {
        return round2(principal / tenure_months as f64);
    }
    let factor = (1.0 + monthly_rate).powi(tenure_months as i32);
    round2(principal * monthly_rate * factor / (factor - 1.0))
}

/// Inverse amortization: the largest principal whose EMI stays within
/// `max_emi` at the given rate and tenure, floored to whole rupees.
pub fn max_principal_for_emi(max_emi: f64, annual_rate_pct: f64, tenure_months: u32) -> i64 {
    if tenure_months == 0 || max_emi <= 0.0 {
        return 0;
    }
    let monthly_rate = annual_rate_pct / 1200.0;
    if monthly_rate == 0.0 {
        return (max_emi * tenure_months as f64).floor() as i64;
    }
    let factor = (1.0 + monthly_rate).powi(tenure_months as i32);
    (max_emi * (factor - 1.0) / (monthly_rate * factor)).floor() as i64
}

/// Decide the requested loan.
///
/// 1. score below the floor: hard reject.
/// 2. amount above twice the limit: soft reject, counter-offer the limit.
/// 3. amount within the limit: instant approval.
/// 4. between limit and twice the limit: salary slip required; with a slip,
///    the EMI must stay within half the verified salary. An unverifiable
///    salary approves (the amount is already capped at twice the limit);
///    a breach counter-offers the largest affordable principal.
pub fn decide(
    profile: &CustomerProfile,
    requested_amount: i64,
    tenure_months: u32,
    slip_uploaded: bool,
    verified_salary: Option<i64>,
) -> UnderwritingOutcome {
    let limit = profile.pre_approved_limit;

    if profile.credit_score < MIN_CREDIT_SCORE {
        return UnderwritingOutcome::hard_reject(format!(
            "Credit score ({}) does not meet the minimum criteria of {}.",
            profile.credit_score, MIN_CREDIT_SCORE
        ));
    }

    if requested_amount > 2 * limit {
        return UnderwritingOutcome::soft_reject(
            limit,
            "Requested amount exceeds twice the pre-approved limit.",
        );
    }

    if requested_amount <= limit {
        return UnderwritingOutcome::approved(calculate_emi(
            requested_amount,
            ANNUAL_INTEREST_RATE_PCT,
            tenure_months,
        ));
    }

    // limit < amount <= 2 * limit
    if !slip_uploaded {
        return UnderwritingOutcome::needs_docs(
            "Loan exceeds the pre-approved limit. Income verification (salary slip) required.",
        );
    }

    let new_emi = calculate_emi(requested_amount, ANNUAL_INTEREST_RATE_PCT, tenure_months);

    let Some(salary) = verified_salary.filter(|s| *s > 0) else {
        return UnderwritingOutcome::approved(new_emi);
    };

    let max_allowed_emi = round2(MAX_EMI_TO_SALARY * salary as f64);
    if new_emi <= max_allowed_emi {
        let mut outcome = UnderwritingOutcome::approved(new_emi);
        outcome.max_allowed_emi = Some(max_allowed_emi);
        outcome.verified_salary = Some(salary);
        return outcome;
    }

    let affordable = max_principal_for_emi(max_allowed_emi, ANNUAL_INTEREST_RATE_PCT, tenure_months);
    let fallback = affordable.min(2 * limit);
    let mut outcome = UnderwritingOutcome::soft_reject(
        fallback,
        format!(
            "Expected EMI (₹{new_emi:.2}) exceeds {:.0}% of the verified salary (₹{salary}).",
            MAX_EMI_TO_SALARY * 100.0
        ),
    );
    outcome.new_emi = Some(new_emi);
    outcome.max_allowed_emi = Some(max_allowed_emi);
    outcome.verified_salary = Some(salary);
    outcome
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(credit_score: u32, limit: i64) -> CustomerProfile {
        CustomerProfile {
            phone: "9999999991".to_string(),
            name: "Amit Sharma".to_string(),
            city: "Mumbai".to_string(),
            address: None,
            credit_score,
            pre_approved_limit: limit,
            existing_monthly_emi: 10_000,
            monthly_salary: Some(80_000),
        }
    }

    #[test]
    fn low_score_is_hard_rejected_regardless_of_amount() {
        for amount in [1_000, 100_000, 2_000_000] {
            let outcome = decide(&profile(650, 500_000), amount, 12, false, None);
            assert_eq!(outcome.status, UnderwritingStatus::HardReject);
            assert!(outcome.reason.as_deref().unwrap().contains("650"));
            assert!(outcome.reason.as_deref().unwrap().contains("700"));
        }
    }

    #[test]
    fn within_limit_is_approved_with_emi() {
        let outcome = decide(&profile(750, 500_000), 200_000, 12, false, None);
        assert_eq!(outcome.status, UnderwritingStatus::Approved);
        assert_eq!(
            outcome.new_emi,
            Some(calculate_emi(200_000, ANNUAL_INTEREST_RATE_PCT, 12))
        );
    }

    #[test]
    fn above_twice_limit_counter_offers_the_limit() {
        let outcome = decide(&profile(750, 500_000), 1_100_000, 12, true, Some(80_000));
        assert_eq!(outcome.status, UnderwritingStatus::SoftReject);
        assert_eq!(outcome.fallback_offer, Some(500_000));
    }

    #[test]
    fn between_limit_and_twice_needs_docs_without_slip() {
        let outcome = decide(&profile(750, 500_000), 800_000, 12, false, None);
        assert_eq!(outcome.status, UnderwritingStatus::NeedsDocs);
    }

    #[test]
    fn unverifiable_salary_approves_with_slip() {
        let outcome = decide(&profile(750, 500_000), 800_000, 12, true, None);
        assert_eq!(outcome.status, UnderwritingStatus::Approved);

        let outcome = decide(&profile(750, 500_000), 800_000, 12, true, Some(0));
        assert_eq!(outcome.status, UnderwritingStatus::Approved);
    }

    #[test]
    fn salary_breach_counter_offers_affordable_principal() {
        let outcome = decide(&profile(750, 500_000), 800_000, 12, true, Some(80_000));
        assert_eq!(outcome.status, UnderwritingStatus::SoftReject);

        let fallback = outcome.fallback_offer.unwrap();
        let max_allowed = outcome.max_allowed_emi.unwrap();
        assert!(fallback <= 1_000_000);
        assert!(fallback > 0);
        // Inverse-amortization correctness: the counter-offer must fit the cap.
        assert!(calculate_emi(fallback, ANNUAL_INTEREST_RATE_PCT, 12) <= max_allowed);
        assert!(outcome.reason.as_deref().unwrap().contains("50%"));
    }

    #[test]
    fn emi_degenerate_cases() {
        assert_eq!(calculate_emi(120_000, 12.0, 0), 0.0);
        assert_eq!(calculate_emi(120_000, 0.0, 12), 10_000.0);
    }

    #[test]
    fn emi_matches_amortization_formula() {
        // 200000 at 12% p.a. over 12 months.
        let emi = calculate_emi(200_000, 12.0, 12);
        assert!((emi - 17_769.76).abs() < 1.0, "emi was {emi}");
    }
}
