//! Error types for the loan voice agent

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Error, Debug)]
pub enum AgentError {

    // =============================
    // Turn Pipeline Errors
    // =============================

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid tool input: {0}")]
    InvalidToolInput(String),

    #[error("Reasoning parse error: {0}")]
    ReasoningParseError(String),

    #[error("Reasoning limit exceeded: {0}")]
    ReasoningLimitExceeded(String),

    #[error("TTS rate limited: {0}")]
    RateLimited(String),

    #[error("TTS generation failed: {0}")]
    TtsError(String),

    #[error("Stage timed out: {0}")]
    TimeoutError(String),

    #[error("Uniqueness violation: {0}")]
    UniquenessViolation(String),

    #[error("State persistence error: {0}")]
    StateError(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
