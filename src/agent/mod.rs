//! Turn orchestrator
//!
//! End-to-end coordinator for one voice turn: transcript in, spoken reply
//! out. Stages run strictly sequentially and log writes are not
//! transactional — a USER log entry with no matching BOT entry is the valid
//! signature of a failed turn.

use crate::classifier::IntentClassifier;
use crate::error::AgentError;
use crate::history::HistoryStore;
use crate::models::{ConversationLog, TurnResult};
use crate::notify::{NotificationEvent, Notifier};
use crate::reasoner::ReasoningLoop;
use crate::speech::{SpeechSynthesizer, DEFAULT_VOICE_ID};
use crate::store::LoanStore;
use crate::Result;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Wall-clock budget per external stage (reasoning, humanizer, synthesis)
pub const STAGE_BUDGET: Duration = Duration::from_secs(10);

/// Spoken reply when the reasoning loop hits its iteration bound
const FALLBACK_REPLY: &str =
    "Sorry, I could not finish processing that. Please repeat your last message.";

/// Coordinates one voice turn end to end.
pub struct TurnOrchestrator {
    reasoning: ReasoningLoop,
    speech: SpeechSynthesizer,
    store: Arc<dyn LoanStore>,
    history: HistoryStore,
    notifier: Arc<dyn Notifier>,
    voice_id: String,
    stage_budget: Duration,
}

impl TurnOrchestrator {
    pub fn new(
        reasoning: ReasoningLoop,
        speech: SpeechSynthesizer,
        store: Arc<dyn LoanStore>,
        history: HistoryStore,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            reasoning,
            speech,
            store,
            history,
            notifier,
            voice_id: DEFAULT_VOICE_ID.to_string(),
            stage_budget: STAGE_BUDGET,
        }
    }

    pub fn with_voice(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = voice_id.into();
        self
    }

    pub fn with_stage_budget(mut self, budget: Duration) -> Self {
        self.stage_budget = budget;
        self
    }

    /// Process one voice turn.
    ///
    /// The per-user history blob is read then rewritten without mutual
    /// exclusion: concurrent turns for the same user may interleave and lose
    /// one update. Callers that need strict per-user ordering must serialize
    /// calls per user around this entry point.
    pub async fn run_turn(&self, transcript: &str, user_id: &str) -> Result<TurnResult> {
        // 1. Validate before any side effect.
        if transcript.trim().is_empty() || user_id.trim().is_empty() {
            return Err(AgentError::ValidationError(
                "Missing transcript or userId".to_string(),
            ));
        }

        let intent = IntentClassifier::classify(transcript);
        info!(user_id = %user_id, intent = %intent, "Turn started");

        // 2. Persist the user utterance. Committed regardless of how the
        // rest of the turn fares.
        self.store
            .append_log(ConversationLog::user(user_id, transcript))
            .await?;

        // 3. Prior context for the reasoning loop.
        let history = self.history.load(user_id).await?;
        debug!(user_id = %user_id, history_len = history.len(), "History loaded");

        // 4. Drive the reasoning loop. Hitting the iteration bound degrades
        // to a graceful spoken fallback instead of raw error text.
        let outcome = match timeout(self.stage_budget, self.reasoning.run(transcript, &history))
            .await
        {
            Err(_) => {
                return Err(AgentError::TimeoutError(
                    "Reasoning stage exceeded its budget".to_string(),
                ))
            }
            Ok(Ok(outcome)) => Some(outcome),
            Ok(Err(AgentError::ReasoningLimitExceeded(msg))) => {
                warn!(user_id = %user_id, "Reasoning limit exceeded: {}", msg);
                None
            }
            Ok(Err(e)) => return Err(e),
        };

        let (response_text, raw_trace) = match outcome {
            Some(outcome) => {
                let spoken = timeout(
                    self.stage_budget,
                    self.reasoning.humanize(&outcome.final_answer),
                )
                .await
                .map_err(|_| {
                    AgentError::TimeoutError("Humanizer stage exceeded its budget".to_string())
                })??;

                let raw = json!({
                    "intent": intent.to_string(),
                    "iterations": outcome.iterations,
                    "technical_answer": outcome.final_answer,
                    "steps": outcome.steps,
                });

                (spoken, raw)
            }
            None => (
                FALLBACK_REPLY.to_string(),
                json!({
                    "intent": intent.to_string(),
                    "error": "reasoning limit exceeded",
                }),
            ),
        };

        // 5. Synthesize the spoken reply.
        let audio_url = timeout(
            self.stage_budget,
            self.speech.generate_speech(&response_text, &self.voice_id),
        )
        .await
        .map_err(|_| {
            AgentError::TimeoutError("Speech synthesis exceeded its budget".to_string())
        })??;

        // 6. Persist the bot reply.
        self.store
            .append_log(ConversationLog::bot(user_id, &response_text))
            .await?;

        // 7. Rewrite the history blob; TTL restarts at the full window.
        let updated = HistoryStore::appended(&history, transcript, &response_text);
        self.history.store(user_id, &updated).await?;

        // 8. Push the result to the client.
        let event =
            NotificationEvent::response(transcript, &response_text, &audio_url, raw_trace);
        self.notifier.publish(user_id, &event).await?;

        info!(user_id = %user_id, "Turn completed");

        // 9. Done.
        Ok(TurnResult {
            transcription: transcript.to_string(),
            response_text,
            audio_url,
        })
    }
}
