//! Core data models for the loan voice agent

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum KycStatus {
    Pending,
    Verified,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum LoanStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Speaker {
    User,
    Bot,
}

//
// ================= User =================
//

/// A farmer applying for a loan. Keyed by phone number; mutated only by the
/// KYC tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub phone_number: String,
    pub name: Option<String>,
    pub kyc_status: KycStatus,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(phone_number: impl Into<String>) -> Self {
        Self {
            phone_number: phone_number.into(),
            name: None,
            kyc_status: KycStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

//
// ================= Loan Application =================
//

/// One underwriting decision. Created exactly once by the underwriting tool,
/// never mutated afterwards. `interest_rate` is Some iff Approved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanApplication {
    pub application_id: Uuid,
    pub user_id: String,
    pub status: LoanStatus,
    pub amount_requested: f64,
    /// Risk score in [0, 100]
    pub risk_score: f64,
    pub interest_rate: Option<f64>,
    /// Opaque land-record blob from the AgriStack lookup
    pub agri_stack_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//
// ================= Conversation Log =================
//

/// Append-only transcript entry; one per user utterance, one per bot reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationLog {
    pub log_id: Uuid,
    pub user_id: String,
    pub message_content: String,
    pub speaker: Speaker,
    pub timestamp: DateTime<Utc>,
}

impl ConversationLog {
    pub fn user(user_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::entry(user_id, content, Speaker::User)
    }

    pub fn bot(user_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::entry(user_id, content, Speaker::Bot)
    }

    fn entry(user_id: impl Into<String>, content: impl Into<String>, speaker: Speaker) -> Self {
        Self {
            log_id: Uuid::new_v4(),
            user_id: user_id.into(),
            message_content: content.into(),
            speaker,
            timestamp: Utc::now(),
        }
    }
}

//
// ================= Land Record =================
//

/// Fixed-shape land attributes returned by the AgriStack lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LandRecord {
    pub acres: f64,
    pub yield_class: String,
    pub crop: String,
    pub state: String,
    pub owner_validated: bool,
}

//
// ================= Tool I/O =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInput {
    pub tool_name: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub data: serde_json::Value,
    pub error: Option<String>,
}

//
// ================= Reasoning Trace =================
//

/// One completed Thought/Action/Observation iteration of the reasoning loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStep {
    pub iteration: u32,
    pub tool_name: String,
    pub tool_input: serde_json::Value,
    pub observation: String,
}

//
// ================= Turn Result =================
//

/// Final output of one voice turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnResult {
    pub transcription: String,
    pub response_text: String,
    pub audio_url: String,
}

impl fmt::Display for KycStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KycStatus::Pending => "PENDING",
            KycStatus::Verified => "VERIFIED",
            KycStatus::Failed => "FAILED",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoanStatus::Draft => "DRAFT",
            LoanStatus::Submitted => "SUBMITTED",
            LoanStatus::Approved => "APPROVED",
            LoanStatus::Rejected => "REJECTED",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Speaker::User => "USER",
            Speaker::Bot => "BOT",
        };
        write!(f, "{}", s)
    }
}
