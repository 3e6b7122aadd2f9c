//! Stateless session recovery.
//!
//! When no durable session record exists, the latest dialogue state and the
//! known fields are rebuilt from the transcript alone: a fold over the typed
//! markers embedded in assistant turns, plus field extraction from human
//! turns. Prose is never pattern-matched.

use dialog_flow::{MessageRole, SerializableMessage};

use crate::extract;
use crate::markers::{self, AskField, Marker};
use crate::steps::Step;

#[derive(Debug, Clone, PartialEq)]
pub struct RecoveredState {
    pub step: Step,
    pub phone: Option<String>,
    pub amount: i64,
}

/// Rebuild the dialogue state from a transcript. The last relevant marker
/// wins; human turns contribute the first phone and the first
/// non-phone-shaped amount.
pub fn recover(transcript: &[SerializableMessage]) -> RecoveredState {
    let mut step = Step::Greet;
    let mut phone: Option<String> = None;
    let mut amount: i64 = 0;

    for turn in transcript {
        match turn.role {
            MessageRole::Assistant => {
                for marker in markers::scan(&turn.content) {
                    step = match marker {
                        Marker::Offer(_) => Step::GetLoanPurpose,
                        Marker::Summary(card) => {
                            amount = card.amount;
                            Step::ConfirmDeal
                        }
                        Marker::Approval(_) | Marker::Rejection(_) => Step::Done,
                        Marker::Ask(field) => step_for_ask(field),
                    };
                }
            }
            MessageRole::Human => {
                if phone.is_none() {
                    phone = extract::find_phone(&turn.content);
                }
                if amount == 0 {
                    let parsed = extract::parse_loan_amount(&turn.content);
                    if parsed > 0 && !extract::is_phone_shaped(parsed) {
                        amount = parsed;
                        if step == Step::Greet {
                            step = Step::WaitingForPhone;
                        }
                    }
                }
            }
        }
    }

    RecoveredState {
        step,
        phone,
        amount,
    }
}

fn step_for_ask(field: AskField) -> Step {
    match field {
        AskField::Phone => Step::WaitingForPhone,
        AskField::Name => Step::GetName,
        AskField::City => Step::GetCity,
        AskField::Purpose => Step::GetLoanPurpose,
        AskField::Amount => Step::Sales,
        AskField::Confirmation => Step::ConfirmDeal,
        AskField::SlipUpload => Step::Underwriting,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markers::{OfferCard, RejectionCard, SummaryCard};

    fn offer_text() -> String {
        markers::offer(&OfferCard {
            pre_approved_limit: 500_000,
            interest_rate: 12.0,
            max_tenure: 60,
        })
    }

    #[test]
    fn empty_transcript_starts_at_greet() {
        let state = recover(&[]);
        assert_eq!(state.step, Step::Greet);
        assert_eq!(state.phone, None);
        assert_eq!(state.amount, 0);
    }

    #[test]
    fn verified_customer_resumes_at_needs_analysis() {
        let transcript = vec![
            SerializableMessage::human("9999999991"),
            SerializableMessage::assistant(format!("{}\nKYC verification successful!", offer_text())),
        ];

        let state = recover(&transcript);
        assert_eq!(state.step, Step::GetLoanPurpose);
        assert_eq!(state.phone.as_deref(), Some("9999999991"));
        assert_eq!(state.amount, 0);
    }

    #[test]
    fn summary_marker_restores_amount_and_confirmation_state() {
        let summary = markers::summary(&SummaryCard {
            amount: 200_000,
            interest_rate: 12.0,
            tenure: 12,
            emi: 17_769.76,
        });
        let transcript = vec![
            SerializableMessage::human("9999999991"),
            SerializableMessage::assistant(offer_text()),
            SerializableMessage::human("2 lakh for wedding"),
            SerializableMessage::assistant(format!("{summary}\nReady to proceed? (yes/no)")),
        ];

        let state = recover(&transcript);
        assert_eq!(state.step, Step::ConfirmDeal);
        assert_eq!(state.phone.as_deref(), Some("9999999991"));
        assert_eq!(state.amount, 200_000);
    }

    #[test]
    fn ask_markers_restore_the_awaited_state() {
        let transcript = vec![
            SerializableMessage::human("9999999994"),
            SerializableMessage::assistant(format!(
                "You seem new here. What is your full name?\n{}",
                markers::ask(AskField::Name)
            )),
        ];
        assert_eq!(recover(&transcript).step, Step::GetName);

        let transcript = vec![
            SerializableMessage::human("9999999991"),
            SerializableMessage::assistant(format!(
                "Please upload your salary slip.\n{}",
                markers::ask(AskField::SlipUpload)
            )),
        ];
        assert_eq!(recover(&transcript).step, Step::Underwriting);
    }

    #[test]
    fn terminal_markers_land_on_done() {
        let rejection = markers::rejection(&RejectionCard {
            reason: "Credit score (650) does not meet the minimum criteria of 700.".to_string(),
            credit_score: Some(650),
        });
        let transcript = vec![
            SerializableMessage::human("9999999992"),
            SerializableMessage::assistant(rejection),
        ];
        assert_eq!(recover(&transcript).step, Step::Done);
    }

    #[test]
    fn phone_number_is_not_mistaken_for_an_amount() {
        let transcript = vec![SerializableMessage::human("9999999991")];
        let state = recover(&transcript);
        assert_eq!(state.phone.as_deref(), Some("9999999991"));
        assert_eq!(state.amount, 0);
    }

    #[test]
    fn amount_typed_at_greet_moves_to_phone_collection() {
        let transcript = vec![SerializableMessage::human("i need a loan of 2 lakh")];
        let state = recover(&transcript);
        assert_eq!(state.step, Step::WaitingForPhone);
        assert_eq!(state.amount, 200_000);
    }
}
