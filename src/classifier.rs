//! Intent classifier
//!
//! Tags each utterance as one of:
//! - LoanRequest: asking for a new loan
//! - KycProvide: sharing identity details (name, Aadhaar, phone)
//! - AgriDetails: sharing land/crop details
//! - StatusCheck: asking about an existing application
//! - General: everything else
//!
//! Used for trace/telemetry only; routing never depends on it.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    LoanRequest,
    KycProvide,
    AgriDetails,
    StatusCheck,
    General,
}

/// Static keyword lists — zero allocation
const LOAN_KEYWORDS: &[&str] = &[
    "loan", "borrow", "credit", "money", "amount", "disburse", "interest",
];

const KYC_KEYWORDS: &[&str] = &[
    "aadhaar", "aadhar", "kyc", "my name is", "phone number", "identity", "verify me",
];

const AGRI_KEYWORDS: &[&str] = &[
    "acre", "plot", "land", "crop", "farm", "wheat", "harvest", "survey number",
];

const STATUS_KEYWORDS: &[&str] = &[
    "status", "application", "approved yet", "update on", "what happened",
];

pub struct IntentClassifier;

impl IntentClassifier {
    /// Classify an utterance by keyword score. Ties resolve to the intent
    /// latest in the candidate list (status > kyc > agri > loan).
    pub fn classify(text: &str) -> Intent {
        let lowered = text.to_lowercase();

        let score = |keywords: &[&str]| keywords.iter().filter(|kw| lowered.contains(**kw)).count();

        let candidates = [
            (Intent::LoanRequest, score(LOAN_KEYWORDS)),
            (Intent::AgriDetails, score(AGRI_KEYWORDS)),
            (Intent::KycProvide, score(KYC_KEYWORDS)),
            (Intent::StatusCheck, score(STATUS_KEYWORDS)),
        ];

        candidates
            .iter()
            .filter(|(_, score)| *score > 0)
            .max_by_key(|(_, score)| *score)
            .map(|(intent, _)| *intent)
            .unwrap_or(Intent::General)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Intent::LoanRequest => "LOAN_REQUEST",
            Intent::KycProvide => "KYC_PROVIDE",
            Intent::AgriDetails => "AGRI_DETAILS",
            Intent::StatusCheck => "STATUS_CHECK",
            Intent::General => "GENERAL",
        };
        write!(f, "{}", s)
    }
}
