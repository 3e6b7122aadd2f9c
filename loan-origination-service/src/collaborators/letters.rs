use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;
use tracing::info;

use crate::underwriting::ANNUAL_INTEREST_RATE_PCT;

/// Everything the sanction document needs.
#[derive(Debug, Clone)]
pub struct SanctionRequest {
    pub customer_name: String,
    pub phone: String,
    pub amount: i64,
    pub emi: f64,
    pub tenure_months: u32,
}

/// Issues formal sanction documents. Rendering internals (PDF layout and
/// the like) belong to the external document service.
#[async_trait]
pub trait SanctionLetters: Send + Sync {
    /// Returns a link the customer can download the document from.
    async fn generate(&self, request: &SanctionRequest) -> anyhow::Result<String>;
}

/// File-backed implementation; documents are served from a static
/// directory under `/documents`.
pub struct FileSanctionLetters {
    dir: PathBuf,
}

impl FileSanctionLetters {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl SanctionLetters for FileSanctionLetters {
    async fn generate(&self, request: &SanctionRequest) -> anyhow::Result<String> {
        fs::create_dir_all(&self.dir).await?;

        let body = format!(
            "SANCTION LETTER\n\
             \n\
             Date: {date}\n\
             To: {name}\n\
             Phone: {phone}\n\
             \n\
             Subject: In-Principle Sanction of Personal Loan\n\
             \n\
             Dear {name},\n\
             \n\
             We are pleased to inform you that your personal loan application has been \
             approved based on the details provided.\n\
             \n\
             --- LOAN DETAILS ---\n\
             Approved Amount: INR {amount}\n\
             Interest Rate: {rate}% p.a.\n\
             Tenure: {tenure} Months\n\
             Monthly EMI: INR {emi:.2}\n\
             \n\
             This is a system-generated letter and does not require a physical signature.\n",
            date = Utc::now().format("%Y-%m-%d"),
            name = request.customer_name,
            phone = request.phone,
            amount = request.amount,
            rate = ANNUAL_INTEREST_RATE_PCT,
            tenure = request.tenure_months,
            emi = request.emi,
        );

        let filename = format!("{}_sanction.txt", request.phone);
        fs::write(self.dir.join(&filename), body).await?;

        info!(phone = %request.phone, amount = request.amount, "sanction letter generated");
        Ok(format!("/documents/{filename}"))
    }
}
