use async_trait::async_trait;
use dashmap::DashMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Customer master data, owned by the external directory system. Read-only
/// to the dialogue core apart from triggering creation of new records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub phone: String,
    pub name: String,
    pub city: String,
    pub address: Option<String>,
    /// Bureau score, 300-900.
    pub credit_score: u32,
    pub pre_approved_limit: i64,
    pub existing_monthly_emi: i64,
    pub monthly_salary: Option<i64>,
}

#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    async fn lookup(&self, phone: &str) -> anyhow::Result<Option<CustomerProfile>>;

    /// Register a brand-new customer. The directory assigns a synthetic
    /// credit score, pre-approved limit and existing EMI.
    async fn create(&self, phone: &str, name: &str, city: &str)
    -> anyhow::Result<CustomerProfile>;
}

/// In-memory directory, optionally seeded with demo customers.
pub struct InMemoryDirectory {
    customers: DashMap<String, CustomerProfile>,
}

impl InMemoryDirectory {
    pub fn seeded() -> Self {
        let customers = DashMap::new();
        for profile in demo_customers() {
            customers.insert(profile.phone.clone(), profile);
        }
        Self { customers }
    }

    pub fn empty() -> Self {
        Self {
            customers: DashMap::new(),
        }
    }
}

fn demo_customers() -> Vec<CustomerProfile> {
    vec![
        CustomerProfile {
            phone: "9999999991".to_string(),
            name: "Amit Sharma".to_string(),
            city: "Mumbai".to_string(),
            address: Some("12 Marine Drive, Mumbai".to_string()),
            credit_score: 750,
            pre_approved_limit: 500_000,
            existing_monthly_emi: 10_000,
            monthly_salary: Some(80_000),
        },
        CustomerProfile {
            phone: "9999999992".to_string(),
            name: "Priya Singh".to_string(),
            city: "Delhi".to_string(),
            address: Some("4 Lodhi Road, Delhi".to_string()),
            // Below the approval floor; exercises the hard-reject path.
            credit_score: 650,
            pre_approved_limit: 200_000,
            existing_monthly_emi: 5_000,
            monthly_salary: Some(40_000),
        },
        CustomerProfile {
            phone: "9999999993".to_string(),
            name: "Rahul Verma".to_string(),
            city: "Bangalore".to_string(),
            address: Some("77 MG Road, Bangalore".to_string()),
            credit_score: 800,
            pre_approved_limit: 1_000_000,
            existing_monthly_emi: 20_000,
            monthly_salary: Some(150_000),
        },
    ]
}

#[async_trait]
impl CustomerDirectory for InMemoryDirectory {
    async fn lookup(&self, phone: &str) -> anyhow::Result<Option<CustomerProfile>> {
        Ok(self.customers.get(phone).map(|entry| entry.clone()))
    }

    async fn create(
        &self,
        phone: &str,
        name: &str,
        city: &str,
    ) -> anyhow::Result<CustomerProfile> {
        let (credit_score, limit_multiple) = {
            let mut rng = rand::thread_rng();
            (rng.gen_range(660..=820), rng.gen_range(6..=10))
        };
        let monthly_salary = 50_000i64;

        let profile = CustomerProfile {
            phone: phone.to_string(),
            name: name.to_string(),
            city: city.to_string(),
            address: Some(format!("{city} (self-declared)")),
            credit_score,
            pre_approved_limit: monthly_salary * limit_multiple,
            existing_monthly_emi: monthly_salary / 10,
            monthly_salary: Some(monthly_salary),
        };

        info!(
            phone,
            name,
            credit_score = profile.credit_score,
            limit = profile.pre_approved_limit,
            "registered new customer"
        );

        self.customers.insert(phone.to_string(), profile.clone());
        Ok(profile)
    }
}
