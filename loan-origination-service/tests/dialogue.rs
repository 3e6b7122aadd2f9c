//! End-to-end dialogue scenarios driven through the orchestrator against
//! in-memory collaborators.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dialog_flow::{InMemorySessionStorage, SerializableMessage, Session, SessionStorage};
use loan_origination_service::collaborators::{
    CompletionService, CustomerDirectory, CustomerProfile, InMemoryDirectory, SanctionLetters,
    SanctionRequest, SlipStore,
};
use loan_origination_service::markers::{self, OfferCard, SummaryCard};
use loan_origination_service::orchestrator::APOLOGY_REPLY;
use loan_origination_service::steps::session_keys;
use loan_origination_service::underwriting::UnderwritingOutcome;
use loan_origination_service::{Collaborators, DialogueOrchestrator, Step};

struct NoCompletion;

#[async_trait]
impl CompletionService for NoCompletion {
    async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
        Err(anyhow::anyhow!("completion disabled in tests"))
    }
}

struct MemorySlips {
    files: Mutex<HashMap<String, Vec<u8>>>,
    salary: i64,
}

impl MemorySlips {
    fn new(salary: i64) -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            salary,
        }
    }
}

#[async_trait]
impl SlipStore for MemorySlips {
    async fn save(&self, phone: &str, bytes: &[u8]) -> anyhow::Result<()> {
        self.files
            .lock()
            .unwrap()
            .insert(phone.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn exists(&self, phone: &str) -> bool {
        self.files.lock().unwrap().contains_key(phone)
    }

    async fn extract_salary(&self, phone: &str) -> anyhow::Result<i64> {
        if self.files.lock().unwrap().contains_key(phone) {
            Ok(self.salary)
        } else {
            Err(anyhow::anyhow!("no slip for {phone}"))
        }
    }
}

struct CountingLetters {
    generated: AtomicUsize,
}

#[async_trait]
impl SanctionLetters for CountingLetters {
    async fn generate(&self, request: &SanctionRequest) -> anyhow::Result<String> {
        self.generated.fetch_add(1, Ordering::SeqCst);
        Ok(format!("/documents/{}_sanction.txt", request.phone))
    }
}

struct FailingDirectory;

#[async_trait]
impl CustomerDirectory for FailingDirectory {
    async fn lookup(&self, _phone: &str) -> anyhow::Result<Option<CustomerProfile>> {
        Err(anyhow::anyhow!("directory unreachable"))
    }

    async fn create(
        &self,
        _phone: &str,
        _name: &str,
        _city: &str,
    ) -> anyhow::Result<CustomerProfile> {
        Err(anyhow::anyhow!("directory unreachable"))
    }
}

struct Fixture {
    orchestrator: DialogueOrchestrator,
    sessions: Arc<InMemorySessionStorage<Step>>,
    letters: Arc<CountingLetters>,
    slips: Arc<MemorySlips>,
}

impl Fixture {
    fn new() -> Self {
        Self::with_salary(80_000)
    }

    fn with_salary(salary: i64) -> Self {
        let sessions = Arc::new(InMemorySessionStorage::new());
        let letters = Arc::new(CountingLetters {
            generated: AtomicUsize::new(0),
        });
        let slips = Arc::new(MemorySlips::new(salary));
        let orchestrator = DialogueOrchestrator::new(
            Collaborators {
                directory: Arc::new(InMemoryDirectory::seeded()),
                slips: slips.clone(),
                letters: letters.clone(),
                completion: Arc::new(NoCompletion),
            },
            sessions.clone(),
        );
        Self {
            orchestrator,
            sessions,
            letters,
            slips,
        }
    }

    async fn say(&self, session_id: &str, message: &str) -> String {
        self.orchestrator
            .handle_turn(session_id, message, None, None)
            .await
            .unwrap()
    }

    async fn step(&self, session_id: &str) -> Step {
        self.sessions
            .get(session_id)
            .await
            .unwrap()
            .unwrap()
            .current_step
    }

    fn letters_generated(&self) -> usize {
        self.letters.generated.load(Ordering::SeqCst)
    }
}

#[tokio::test]
async fn verified_customer_is_approved_end_to_end() {
    let f = Fixture::new();

    let r1 = f.say("s1", "9999999991").await;
    assert!(r1.contains("[LOAN_OFFER]"), "reply was: {r1}");
    assert!(r1.contains("Amit Sharma"));
    assert_eq!(f.step("s1").await, Step::GetLoanPurpose);

    let r2 = f.say("s1", "2 lakh for wedding").await;
    assert!(r2.contains("[LOAN_SUMMARY]"), "reply was: {r2}");
    assert!(r2.contains("Wedding"));
    assert_eq!(f.step("s1").await, Step::ConfirmDeal);

    let r3 = f.say("s1", "yes").await;
    assert!(r3.contains("[APPROVAL]"), "reply was: {r3}");
    assert_eq!(f.step("s1").await, Step::Done);
    assert_eq!(f.letters_generated(), 1);
}

#[tokio::test]
async fn low_credit_score_is_hard_rejected() {
    let f = Fixture::new();

    f.say("s2", "9999999992").await;
    f.say("s2", "50000 for travel").await;
    let reply = f.say("s2", "yes").await;

    assert!(reply.contains("[REJECTION]"), "reply was: {reply}");
    assert!(reply.contains("650"));
    assert_eq!(f.step("s2").await, Step::Done);
    assert_eq!(f.letters_generated(), 0);
}

#[tokio::test]
async fn duplicate_resubmission_replays_the_prior_reply() {
    let f = Fixture::new();

    f.say("s3", "9999999991").await;
    f.say("s3", "2 lakh for wedding").await;
    let first = f.say("s3", "yes").await;
    assert_eq!(f.letters_generated(), 1);

    let second = f.say("s3", "yes").await;
    assert_eq!(first, second);
    // No second sanction document.
    assert_eq!(f.letters_generated(), 1);
}

#[tokio::test]
async fn reset_interrupt_clears_the_session() {
    let f = Fixture::new();

    f.say("s4", "9999999991").await;
    assert_eq!(f.step("s4").await, Step::GetLoanPurpose);

    let reply = f.say("s4", "restart").await;
    assert!(reply.to_lowercase().contains("reset"));
    assert_eq!(f.step("s4").await, Step::Greet);

    // Customer facts are gone: a loan ask goes back to phone collection.
    let reply = f.say("s4", "i need a loan of 2 lakh").await;
    assert!(reply.contains("10-digit"));
    assert_eq!(f.step("s4").await, Step::WaitingForPhone);
}

#[tokio::test]
async fn session_is_recovered_from_transcript_markers() {
    let f = Fixture::new();

    let transcript = vec![
        SerializableMessage::human("9999999991"),
        SerializableMessage::assistant(format!(
            "{}\nKYC verification successful!",
            markers::offer(&OfferCard {
                pre_approved_limit: 500_000,
                interest_rate: 12.0,
                max_tenure: 60,
            })
        )),
        SerializableMessage::human("2 lakh for wedding"),
        SerializableMessage::assistant(format!(
            "{}\nReady to proceed? (yes/no)",
            markers::summary(&SummaryCard {
                amount: 200_000,
                interest_rate: 12.0,
                tenure: 12,
                emi: 17_769.76,
            })
        )),
    ];

    // No stored session for this id; the transcript alone must carry the
    // state into underwriting.
    let reply = f
        .orchestrator
        .handle_turn("fresh", "yes", Some(&transcript), None)
        .await
        .unwrap();

    assert!(reply.contains("[APPROVAL]"), "reply was: {reply}");
    assert_eq!(f.step("fresh").await, Step::Done);
    assert_eq!(f.letters_generated(), 1);
}

#[tokio::test]
async fn above_limit_needs_docs_then_counter_offer_after_slip() {
    let f = Fixture::new();

    f.say("s5", "9999999991").await;
    f.say("s5", "8 lakh for wedding").await;

    let reply = f.say("s5", "yes").await;
    assert!(reply.contains("salary slip"), "reply was: {reply}");
    assert_eq!(f.step("s5").await, Step::Underwriting);
    assert_eq!(f.letters_generated(), 0);

    f.slips.save("9999999991", b"Net Pay: 80,000").await.unwrap();

    // EMI on 8 lakh breaches half of the 80k salary, so a counter-offer
    // comes back instead of an approval.
    let reply = f.say("s5", "uploaded").await;
    assert!(reply.contains("[LOAN_SUMMARY]"), "reply was: {reply}");
    assert_eq!(f.step("s5").await, Step::ConfirmDeal);

    // The counter-offered amount is within the instant limit, so accepting
    // it approves and issues the letter.
    let reply = f.say("s5", "yes").await;
    assert!(reply.contains("[APPROVAL]"), "reply was: {reply}");
    assert_eq!(f.step("s5").await, Step::Done);
    assert_eq!(f.letters_generated(), 1);
}

#[tokio::test]
async fn upload_claim_without_a_file_never_reaches_the_engine() {
    let f = Fixture::new();

    f.say("s6", "9999999991").await;
    f.say("s6", "8 lakh for wedding").await;
    f.say("s6", "yes").await;
    assert_eq!(f.step("s6").await, Step::Underwriting);

    let reply = f.say("s6", "uploaded").await;
    assert!(reply.contains("re-upload"), "reply was: {reply}");
    assert_eq!(f.step("s6").await, Step::Underwriting);
    assert_eq!(f.letters_generated(), 0);
}

#[tokio::test]
async fn tenure_override_flows_into_the_quote() {
    let f = Fixture::new();

    f.orchestrator
        .handle_turn("s7", "9999999991", None, Some(24))
        .await
        .unwrap();
    let reply = f.say("s7", "2 lakh for wedding").await;

    assert!(reply.contains("Tenure: 24 months"), "reply was: {reply}");
}

#[tokio::test]
async fn new_customer_registers_before_the_offer() {
    let f = Fixture::new();

    let reply = f.say("s8", "9876543210").await;
    assert!(reply.contains("full name"), "reply was: {reply}");
    assert_eq!(f.step("s8").await, Step::GetName);

    let reply = f.say("s8", "Rohan Mehta").await;
    assert!(reply.contains("city"), "reply was: {reply}");
    assert_eq!(f.step("s8").await, Step::GetCity);

    // An amount is not a city; the step re-prompts.
    let reply = f.say("s8", "2 lakh").await;
    assert!(reply.contains("city"), "reply was: {reply}");
    assert_eq!(f.step("s8").await, Step::GetCity);

    let reply = f.say("s8", "Pune").await;
    assert!(reply.contains("[LOAN_OFFER]"), "reply was: {reply}");
    assert_eq!(f.step("s8").await, Step::GetLoanPurpose);
}

#[tokio::test]
async fn purpose_and_amount_can_arrive_in_either_order() {
    let f = Fixture::new();

    f.say("s10", "9999999991").await;

    let reply = f.say("s10", "it's for my wedding").await;
    assert!(reply.contains("How much"), "reply was: {reply}");
    assert_eq!(f.step("s10").await, Step::GetLoanPurpose);

    let reply = f.say("s10", "2 lakh").await;
    assert!(reply.contains("[LOAN_SUMMARY]"), "reply was: {reply}");
    assert!(reply.contains("Wedding"));
    assert_eq!(f.step("s10").await, Step::ConfirmDeal);
}

#[tokio::test]
async fn final_outcome_replays_a_stored_decision_identically() {
    let f = Fixture::new();

    // Drive one session to an approval through underwriting.
    f.say("a", "9999999991").await;
    f.say("a", "2 lakh for wedding").await;
    let direct = f.say("a", "yes").await;

    let stored = f.sessions.get("a").await.unwrap().unwrap();
    let decision: UnderwritingOutcome = stored
        .context
        .get(session_keys::FINAL_DECISION)
        .await
        .unwrap();

    // Seed a second session at final_outcome with the same stored decision.
    let session = Session::new("b", Step::FinalOutcome);
    session
        .context
        .set(session_keys::CUSTOMER_PHONE, "9999999991")
        .await;
    session
        .context
        .set(session_keys::CUSTOMER_NAME, "Amit Sharma")
        .await;
    session.context.set(session_keys::LOAN_AMOUNT, 200_000).await;
    session
        .context
        .set(session_keys::FINAL_DECISION, &decision)
        .await;
    f.sessions.save(session).await.unwrap();

    let replayed = f.say("b", "status please").await;
    assert_eq!(direct, replayed);
    assert_eq!(f.step("b").await, Step::Done);
}

#[tokio::test]
async fn collaborator_failure_yields_one_apology_and_preserves_state() {
    let sessions = Arc::new(InMemorySessionStorage::new());
    let orchestrator = DialogueOrchestrator::new(
        Collaborators {
            directory: Arc::new(FailingDirectory),
            slips: Arc::new(MemorySlips::new(0)),
            letters: Arc::new(CountingLetters {
                generated: AtomicUsize::new(0),
            }),
            completion: Arc::new(NoCompletion),
        },
        sessions.clone(),
    );

    let reply = orchestrator
        .handle_turn("s9", "9999999991", None, None)
        .await
        .unwrap();
    assert_eq!(reply, APOLOGY_REPLY);

    // The failed turn was not persisted; nothing advanced.
    assert!(sessions.get("s9").await.unwrap().is_none());
}
