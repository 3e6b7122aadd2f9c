//! Field extractors: pure text parsers and validators shared by the step
//! handlers and session recovery.

use std::sync::LazyLock;

use regex::Regex;

static LAKH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:lakhs?|lacs?)").unwrap());
static THOUSAND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:thousand|k)\b").unwrap());
static DIGIT_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());
static PHONE_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{10,}").unwrap());
static NAME_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z\s.'-]{2,60}$").unwrap());
static NOISE_WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(lakhs?|lacs?|loan|rupees?|thousand|amount|emi|borrow)\b").unwrap()
});
static NAME_NOISE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(loan|emi|amount|borrow|rupees?|salary|limit)\b").unwrap()
});
static LOAN_INTENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(loan|borrow|need|want|apply)\b").unwrap());
static AFFIRM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(yes|yeah|yep|sure|ok|okay|definitely|proceed)\b").unwrap());
static NEGATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(no|nope|nah)\b").unwrap());
static RESET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(reset|restart|cancel)\b").unwrap());

/// Parse human amount text like `2 lakh`, `1.5 lakh`, `50 thousand`, `40k`
/// or `200000` into rupees. Returns 0 when nothing is recognized.
///
/// A 10-digit phone number parses as a plain number here; callers must
/// screen phone-shaped values with [`is_phone_shaped`] on ambiguous text.
pub fn parse_loan_amount(text: &str) -> i64 {
    if text.is_empty() {
        return 0;
    }
    let s = text.to_lowercase().replace(',', " ");

    if let Some(caps) = LAKH_RE.captures(&s) {
        let value: f64 = caps[1].parse().unwrap_or(0.0);
        return (value * 100_000.0) as i64;
    }

    if let Some(caps) = THOUSAND_RE.captures(&s) {
        let value: f64 = caps[1].parse().unwrap_or(0.0);
        return (value * 1_000.0) as i64;
    }

    let runs: Vec<&str> = DIGIT_RUN_RE.find_iter(&s).map(|m| m.as_str()).collect();

    // A run of 5+ digits is taken as a plain rupee amount, latest first.
    for run in runs.iter().rev() {
        if run.len() >= 5 {
            if let Ok(value) = run.parse::<i64>() {
                return value;
            }
        }
    }

    if let Some(last) = runs.last() {
        return last.parse().unwrap_or(0);
    }

    0
}

/// Indian mobile numbers are 10 digits starting with 6-9; an "amount" in
/// that range almost certainly came from a phone number.
pub fn is_phone_shaped(amount: i64) -> bool {
    (6_000_000_000..=9_999_999_999).contains(&amount)
}

/// Exactly 10 digits after stripping separators, or nothing.
pub fn parse_phone(text: &str) -> Option<String> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    (digits.len() == 10).then_some(digits)
}

pub fn digit_count(text: &str) -> usize {
    text.chars().filter(|c| c.is_ascii_digit()).count()
}

/// Last 10 digits of the last 10+-digit run in the text, for transcript
/// recovery of a phone typed with a country prefix.
pub fn find_phone(text: &str) -> Option<String> {
    PHONE_RUN_RE
        .find_iter(text)
        .last()
        .map(|m| m.as_str()[m.as_str().len() - 10..].to_string())
}

/// Check whether free text plausibly is a person's name.
pub fn is_probable_name(text: &str) -> bool {
    let raw = text.trim();
    let low = raw.to_lowercase();

    const BAD_TOKENS: [&str; 10] = [
        "hi", "hii", "hey", "hello", "yo", "ok", "resume", "start new", "restart", "cancel",
    ];
    if BAD_TOKENS.contains(&low.as_str()) {
        return false;
    }
    if raw.len() < 2 || raw.len() > 60 {
        return false;
    }
    if raw.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }
    if NAME_NOISE_RE.is_match(&low) || low.contains('₹') {
        return false;
    }
    if !NAME_CHARS_RE.is_match(raw) {
        return false;
    }
    raw.chars().any(|c| c.is_alphabetic())
}

/// City validation: no digits, no loan vocabulary, sane length.
pub fn is_probable_city(text: &str) -> bool {
    let raw = text.trim();
    if raw.len() < 2 || raw.len() > 50 {
        return false;
    }
    if raw.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }
    !NOISE_WORD_RE.is_match(raw)
}

/// True when the input reads as an amount or other loan chatter rather
/// than the name/city the current step asked for.
pub fn looks_like_amount_or_noise(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit()) || NOISE_WORD_RE.is_match(text)
}

/// Keyword-to-category mapping for the loan purpose; first match wins.
const PURPOSE_KEYWORDS: &[(&str, &str)] = &[
    ("wedding", "Wedding"),
    ("marriage", "Wedding"),
    ("medical", "Medical Expenses"),
    ("health", "Medical Expenses"),
    ("hospital", "Medical Expenses"),
    ("treatment", "Medical Expenses"),
    ("travel", "Travel"),
    ("vacation", "Travel"),
    ("holiday", "Travel"),
    ("trip", "Travel"),
    ("education", "Education"),
    ("study", "Education"),
    ("college", "Education"),
    ("home", "Home Improvement"),
    ("renovation", "Home Improvement"),
    ("repair", "Home Improvement"),
    ("house", "Home Improvement"),
    ("furniture", "Home Improvement"),
    ("appliance", "Home Improvement"),
    ("business", "Business"),
    ("startup", "Business"),
    ("investment", "Business"),
    ("car", "Vehicle Purchase"),
    ("vehicle", "Vehicle Purchase"),
    ("bike", "Vehicle Purchase"),
    ("debt", "Debt Consolidation"),
    ("consolidation", "Debt Consolidation"),
    ("emergency", "Emergency"),
    ("personal", "Personal"),
    ("other", "Personal"),
];

pub fn extract_purpose(text: &str) -> String {
    let low = text.to_lowercase();
    for (keyword, category) in PURPOSE_KEYWORDS {
        if low.contains(keyword) {
            return (*category).to_string();
        }
    }
    String::new()
}

pub fn is_affirmation(text: &str) -> bool {
    AFFIRM_RE.is_match(text)
}

pub fn is_negation(text: &str) -> bool {
    NEGATION_RE.is_match(text)
}

/// Exact short affirmations, used by `greet` to catch a bare "yes" after an
/// offer mention.
pub fn is_pure_affirmation(text: &str) -> bool {
    const AFFIRMATIONS: [&str; 8] = [
        "yes", "yeah", "yep", "sure", "ok", "okay", "yes please", "definitely",
    ];
    AFFIRMATIONS.contains(&text.trim().to_lowercase().as_str())
}

pub fn is_greeting(text: &str) -> bool {
    let trimmed = text.trim().to_lowercase();
    trimmed.len() < 20
        && ["hi", "hello", "hey", "greetings"]
            .iter()
            .any(|g| trimmed.starts_with(g))
}

pub fn has_loan_intent(text: &str) -> bool {
    LOAN_INTENT_RE.is_match(text)
}

/// Broad loan-need detection for messages without an explicit amount.
pub fn mentions_loan_need(text: &str) -> bool {
    const PHRASES: [&str; 15] = [
        "apply",
        "want a loan",
        "want loan",
        "need money",
        "need loan",
        "start",
        "borrow",
        "give me loan",
        "i need",
        "personal loan",
        "wedding",
        "marriage",
        "medical",
        "education",
        "emergency",
    ];
    let low = text.to_lowercase();
    PHRASES.iter().any(|p| low.contains(p))
}

pub fn is_upload_claim(text: &str) -> bool {
    const PHRASES: [&str; 6] = [
        "uploaded",
        "i uploaded",
        "file uploaded",
        "done upload",
        "upload done",
        "uploaded here",
    ];
    PHRASES.contains(&text.trim().to_lowercase().as_str())
}

pub fn is_reset_request(text: &str) -> bool {
    RESET_RE.is_match(text)
}
