use async_trait::async_trait;
use rig::{agent::Agent, client::CompletionClient, completion::Prompt, providers::openrouter};

/// Best-effort natural-language completion collaborator. Given a prompt it
/// returns a single text completion; content is never validated here.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

/// rig-backed completion service talking to OpenRouter.
pub struct OpenRouterCompletion {
    model: String,
}

impl OpenRouterCompletion {
    pub fn new() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
        }
    }

    fn agent(&self) -> anyhow::Result<Agent<openrouter::CompletionModel>> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENROUTER_API_KEY not set"))?;
        let client = openrouter::Client::new(&api_key);
        Ok(client.agent(&self.model).build())
    }
}

impl Default for OpenRouterCompletion {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionService for OpenRouterCompletion {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        let agent = self.agent()?;
        let response = agent.prompt(prompt).await?;
        Ok(response)
    }
}
