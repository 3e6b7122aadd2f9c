use std::sync::Arc;

use async_trait::async_trait;
use dialog_flow::{Context, FlowError, Result, StepHandler, StepResult};

use crate::collaborators::{CustomerDirectory, SanctionLetters};
use crate::underwriting::UnderwritingOutcome;

use super::{Step, session_keys, underwrite::present_decision};

/// Legacy synthesis state: replays the outcome branching for a decision
/// that was already computed and stored, producing the same replies and
/// transitions as the underwriting step itself.
pub struct FinalOutcomeStep {
    directory: Arc<dyn CustomerDirectory>,
    letters: Arc<dyn SanctionLetters>,
}

impl FinalOutcomeStep {
    pub fn new(directory: Arc<dyn CustomerDirectory>, letters: Arc<dyn SanctionLetters>) -> Self {
        Self { directory, letters }
    }
}

#[async_trait]
impl StepHandler<Step> for FinalOutcomeStep {
    async fn run(&self, context: Context) -> Result<StepResult<Step>> {
        let decision: UnderwritingOutcome = context
            .get(session_keys::FINAL_DECISION)
            .await
            .ok_or_else(|| FlowError::MissingContext("final_decision".to_string()))?;

        present_decision(&context, &decision, &self.directory, &self.letters).await
    }
}
