// Loan application dialogue steps, one handler per state.
pub mod collect_city;
pub mod collect_name;
pub mod collect_phone;
pub mod confirm_deal;
pub mod done;
pub mod final_outcome;
pub mod greet;
pub mod loan_purpose;
pub mod sales;
pub mod underwrite;
pub mod verify;

// Shared modules
pub mod types;
pub mod utils;

pub use collect_city::CollectCityStep;
pub use collect_name::CollectNameStep;
pub use collect_phone::CollectPhoneStep;
pub use confirm_deal::ConfirmDealStep;
pub use done::DoneStep;
pub use final_outcome::FinalOutcomeStep;
pub use greet::GreetStep;
pub use loan_purpose::LoanPurposeStep;
pub use sales::SalesStep;
pub use underwrite::UnderwritingStep;
pub use verify::VerifyStep;

pub use types::session_keys;

use dialog_flow::FlowState;
use serde::{Deserialize, Serialize};

/// Dialogue states of the loan application flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Greet,
    WaitingForPhone,
    Verifying,
    GetName,
    GetCity,
    GetLoanPurpose,
    Sales,
    ConfirmDeal,
    Underwriting,
    FinalOutcome,
    Done,
}

impl FlowState for Step {
    fn name(&self) -> &'static str {
        match self {
            Step::Greet => "greet",
            Step::WaitingForPhone => "waiting_for_phone",
            Step::Verifying => "verifying",
            Step::GetName => "get_name",
            Step::GetCity => "get_city",
            Step::GetLoanPurpose => "get_loan_purpose",
            Step::Sales => "sales",
            Step::ConfirmDeal => "confirm_deal",
            Step::Underwriting => "underwriting",
            Step::FinalOutcome => "final_outcome",
            Step::Done => "done",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Step::Done)
    }
}
