//! Inline response markers.
//!
//! Assistant replies embed `[KIND]{json}[/KIND]` fragments so the
//! presentation layer can render rich cards and session recovery can
//! re-derive dialogue state from the transcript without matching prose.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferCard {
    pub pre_approved_limit: i64,
    pub interest_rate: f64,
    pub max_tenure: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryCard {
    pub amount: i64,
    pub interest_rate: f64,
    pub tenure: u32,
    pub emi: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalCard {
    pub name: String,
    pub amount: i64,
    pub emi: f64,
    pub doc_link: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectionCard {
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_score: Option<u32>,
}

/// Field the assistant is waiting for, so recovery can re-derive the
/// awaited state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AskField {
    Phone,
    Name,
    City,
    Amount,
    Purpose,
    Confirmation,
    SlipUpload,
}

#[derive(Serialize, Deserialize)]
struct AskPayload {
    field: AskField,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Marker {
    Offer(OfferCard),
    Summary(SummaryCard),
    Approval(ApprovalCard),
    Rejection(RejectionCard),
    Ask(AskField),
}

pub fn offer(card: &OfferCard) -> String {
    wrap("LOAN_OFFER", card)
}

pub fn summary(card: &SummaryCard) -> String {
    wrap("LOAN_SUMMARY", card)
}

pub fn approval(card: &ApprovalCard) -> String {
    wrap("APPROVAL", card)
}

pub fn rejection(card: &RejectionCard) -> String {
    wrap("REJECTION", card)
}

pub fn ask(field: AskField) -> String {
    wrap("ASK", &AskPayload { field })
}

fn wrap<T: Serialize>(kind: &str, payload: &T) -> String {
    let json = serde_json::to_string(payload).expect("marker payload must serialize");
    format!("[{kind}]{json}[/{kind}]")
}

static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\[(LOAN_OFFER|LOAN_SUMMARY|APPROVAL|REJECTION|ASK)\](\{.*?\})\[/(LOAN_OFFER|LOAN_SUMMARY|APPROVAL|REJECTION|ASK)\]",
    )
    .unwrap()
});

/// Scan a reply for markers, in document order. Malformed payloads and
/// mismatched tags are skipped.
pub fn scan(text: &str) -> Vec<Marker> {
    MARKER_RE
        .captures_iter(text)
        .filter(|caps| caps[1] == caps[3])
        .filter_map(|caps| {
            let body = &caps[2];
            match &caps[1] {
                "LOAN_OFFER" => serde_json::from_str(body).ok().map(Marker::Offer),
                "LOAN_SUMMARY" => serde_json::from_str(body).ok().map(Marker::Summary),
                "APPROVAL" => serde_json::from_str(body).ok().map(Marker::Approval),
                "REJECTION" => serde_json::from_str(body).ok().map(Marker::Rejection),
                "ASK" => serde_json::from_str::<AskPayload>(body)
                    .ok()
                    .map(|p| Marker::Ask(p.field)),
                _ => None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_markers_in_document_order() {
        let text = format!(
            "{}\nWelcome back!\n{}",
            offer(&OfferCard {
                pre_approved_limit: 500_000,
                interest_rate: 12.0,
                max_tenure: 60,
            }),
            ask(AskField::Purpose),
        );

        let markers = scan(&text);
        assert_eq!(markers.len(), 2);
        assert!(matches!(markers[0], Marker::Offer(ref card) if card.pre_approved_limit == 500_000));
        assert_eq!(markers[1], Marker::Ask(AskField::Purpose));
    }

    #[test]
    fn summary_round_trips_through_text() {
        let card = SummaryCard {
            amount: 200_000,
            interest_rate: 12.0,
            tenure: 12,
            emi: 17_769.76,
        };
        let markers = scan(&summary(&card));
        assert_eq!(markers, vec![Marker::Summary(card)]);
    }

    #[test]
    fn malformed_markers_are_skipped() {
        assert!(scan("[LOAN_OFFER]{not json}[/LOAN_OFFER]").is_empty());
        assert!(scan("[LOAN_OFFER]{\"amount\":1}[/ASK]").is_empty());
        assert!(scan("no markers here").is_empty());
    }
}
