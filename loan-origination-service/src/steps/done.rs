use async_trait::async_trait;
use dialog_flow::{Context, Result, StepHandler, StepResult, Transition};

use super::Step;

/// Terminal state. Only the global reset interrupt reopens the session.
pub struct DoneStep;

#[async_trait]
impl StepHandler<Step> for DoneStep {
    async fn run(&self, _context: Context) -> Result<StepResult<Step>> {
        Ok(StepResult::new(
            Some(
                "This application is complete. Say \"restart\" whenever you'd like to \
                 begin a new one."
                    .to_string(),
            ),
            Transition::Stay,
        ))
    }
}
