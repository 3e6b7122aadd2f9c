use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tracing::warn;

use super::completion::CompletionService;

/// Store of uploaded salary slips, keyed by customer phone.
#[async_trait]
pub trait SlipStore: Send + Sync {
    async fn save(&self, phone: &str, bytes: &[u8]) -> anyhow::Result<()>;

    async fn exists(&self, phone: &str) -> bool;

    /// Extract the monthly net salary from the stored slip. `Ok(0)` means
    /// the document was readable but no usable number was found.
    async fn extract_salary(&self, phone: &str) -> anyhow::Result<i64>;
}

const SALARY_PROMPT: &str = r#"You are given the text of an employee salary slip.
From this text, identify the employee's monthly take-home salary (net pay).
Return ONLY the number, without any currency symbol or extra text.
If there are multiple months or values, choose the main monthly net salary.

Payslip text:
"#;

/// Filesystem-backed slip store. Salary extraction reads the stored
/// document and delegates the number hunt to the completion service.
pub struct FsSlipStore {
    dir: PathBuf,
    completion: Arc<dyn CompletionService>,
}

impl FsSlipStore {
    pub fn new(dir: impl Into<PathBuf>, completion: Arc<dyn CompletionService>) -> Self {
        Self {
            dir: dir.into(),
            completion,
        }
    }

    fn slip_path(&self, phone: &str) -> PathBuf {
        self.dir.join(format!("{phone}_salary_slip.pdf"))
    }
}

#[async_trait]
impl SlipStore for FsSlipStore {
    async fn save(&self, phone: &str, bytes: &[u8]) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir).await?;
        fs::write(self.slip_path(phone), bytes).await?;
        Ok(())
    }

    async fn exists(&self, phone: &str) -> bool {
        if phone.is_empty() {
            return false;
        }
        fs::try_exists(self.slip_path(phone)).await.unwrap_or(false)
    }

    async fn extract_salary(&self, phone: &str) -> anyhow::Result<i64> {
        let bytes = fs::read(self.slip_path(phone)).await?;
        let text = String::from_utf8_lossy(&bytes);

        let prompt = format!("{SALARY_PROMPT}\"\"\"{text}\"\"\"");
        let raw = self.completion.complete(&prompt).await?;

        let cleaned = raw.trim().replace(',', "");
        match cleaned.parse::<f64>() {
            Ok(value) if value > 0.0 => Ok(value.round() as i64),
            _ => {
                warn!(
                    phone,
                    raw = %raw.chars().take(80).collect::<String>(),
                    "salary extraction returned no usable number"
                );
                Ok(0)
            }
        }
    }
}
