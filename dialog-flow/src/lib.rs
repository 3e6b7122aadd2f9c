pub mod context;
pub mod error;
pub mod machine;
pub mod message;
pub mod runner;
pub mod step;
pub mod storage;

// Re-export commonly used types
pub use context::{Context, ContextSnapshot};
pub use error::{FlowError, Result};
pub use machine::{StateMachine, StateMachineBuilder, TurnResult, TurnStatus};
pub use message::{MessageRole, SerializableMessage};
pub use runner::FlowRunner;
pub use step::{FlowState, StepHandler, StepResult, Transition};
pub use storage::{InMemorySessionStorage, PostgresSessionStorage, Session, SessionStorage};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use std::sync::Arc;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    enum TestStep {
        Ask,
        Answer,
        Finished,
    }

    impl FlowState for TestStep {
        fn name(&self) -> &'static str {
            match self {
                TestStep::Ask => "ask",
                TestStep::Answer => "answer",
                TestStep::Finished => "finished",
            }
        }

        fn is_terminal(&self) -> bool {
            matches!(self, TestStep::Finished)
        }
    }

    struct AskHandler;

    #[async_trait]
    impl StepHandler<TestStep> for AskHandler {
        async fn run(&self, context: Context) -> Result<StepResult<TestStep>> {
            let input: String = context.get("input").await.unwrap_or_default();
            context.set("echo", format!("heard: {input}")).await;
            Ok(StepResult::new(None, Transition::Dispatch(TestStep::Answer)))
        }
    }

    struct AnswerHandler;

    #[async_trait]
    impl StepHandler<TestStep> for AnswerHandler {
        async fn run(&self, context: Context) -> Result<StepResult<TestStep>> {
            let echo: String = context
                .get("echo")
                .await
                .ok_or_else(|| FlowError::MissingContext("echo".to_string()))?;
            Ok(StepResult::new(
                Some(echo),
                Transition::To(TestStep::Finished),
            ))
        }
    }

    fn test_machine() -> StateMachine<TestStep> {
        StateMachineBuilder::new("test")
            .register(TestStep::Ask, Arc::new(AskHandler))
            .register(TestStep::Answer, Arc::new(AnswerHandler))
            .build()
    }

    #[tokio::test]
    async fn dispatch_runs_target_in_same_turn() {
        let machine = test_machine();
        let mut session = Session::new("s1", TestStep::Ask);
        session.context.set("input", "hello").await;

        let result = machine.handle_turn(&mut session).await.unwrap();

        assert_eq!(result.reply.as_deref(), Some("heard: hello"));
        assert_eq!(result.status, TurnStatus::Completed);
        assert_eq!(session.current_step, TestStep::Finished);
    }

    #[tokio::test]
    async fn unregistered_step_fails_loudly() {
        let machine = test_machine();
        let mut session = Session::new("s2", TestStep::Finished);

        let err = machine.handle_turn(&mut session).await.unwrap_err();
        assert!(matches!(err, FlowError::UnknownStep(_)));
    }

    #[tokio::test]
    async fn storage_round_trip() {
        let storage = InMemorySessionStorage::new();

        let session: Session<TestStep> = Session::new("session1", TestStep::Ask);
        session.context.set("input", "hi").await;
        storage.save(session).await.unwrap();

        let restored = storage.get("session1").await.unwrap().unwrap();
        assert_eq!(restored.current_step, TestStep::Ask);
        let input: String = restored.context.get("input").await.unwrap();
        assert_eq!(input, "hi");
    }

    #[tokio::test]
    async fn flow_runner_loads_handles_and_saves() {
        let machine = Arc::new(test_machine());
        let storage: Arc<InMemorySessionStorage<TestStep>> = Arc::new(InMemorySessionStorage::new());

        let session = Session::new("r1", TestStep::Ask);
        session.context.set("input", "ping").await;
        storage.save(session).await.unwrap();

        let runner = FlowRunner::new(machine, storage.clone());
        let result = runner.run("r1").await.unwrap();

        assert_eq!(result.reply.as_deref(), Some("heard: ping"));
        let saved = storage.get("r1").await.unwrap().unwrap();
        assert_eq!(saved.current_step, TestStep::Finished);

        let err = runner.run("missing").await.unwrap_err();
        assert!(matches!(err, FlowError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn context_snapshot_round_trip() {
        let context = Context::new();
        context.set("amount", 200000).await;
        context.add_human_message("hello").await;
        context.add_assistant_message("hi there").await;

        let restored = Context::from_snapshot(context.snapshot());

        let amount: i64 = restored.get("amount").await.unwrap();
        assert_eq!(amount, 200000);
        let messages = restored.get_all_messages().await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::Human);
        assert_eq!(
            restored.last_assistant_message().await.as_deref(),
            Some("hi there")
        );
    }
}
