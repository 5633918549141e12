use agri_loan_orchestrator::{
    agent::TurnOrchestrator,
    cache::InMemoryCache,
    history::HistoryStore,
    notify::NullNotifier,
    reasoner::{MockOracle, ReasoningLoop},
    speech::{SpeechSynthesizer, TtsProvider},
    store::{InMemoryLoanStore, LoanStore},
    tools::create_default_registry,
};
use std::sync::Arc;
use tracing::info;

/// Stand-in provider so the demo runs without a Murf account.
struct EchoProvider;

#[async_trait::async_trait]
impl TtsProvider for EchoProvider {
    async fn synthesize(&self, text: &str, _voice_id: &str) -> agri_loan_orchestrator::Result<String> {
        Ok(format!("https://audio.local/{}.mp3", text.len()))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    info!("Loan Voice Agent starting (demo mode)");

    // Scripted oracle walking the full loan pipeline.
    let oracle = Arc::new(MockOracle::scripted(vec![
        "Thought: Do I need to use a tool? Yes\nAction: kyc_verification\nAction Input: {\"phoneNumber\": \"9876543210\", \"name\": \"Raju\", \"aadhaarNumber\": \"123456789012\"}",
        "Thought: Do I need to use a tool? Yes\nAction: agri_stack_lookup\nAction Input: {\"plotNumber\": \"MH-204\", \"state\": \"MH\"}",
        "Thought: Do I need to use a tool? Yes\nAction: credit_scoring\nAction Input: {\"acres\": 2.5, \"yieldStatus\": \"high\", \"kycStatus\": \"VERIFIED\"}",
        "Thought: Do I need to use a tool? Yes\nAction: underwriting_decision\nAction Input: {\"score\": 95.0, \"userId\": \"demo-user\", \"landData\": {\"acres\": 2.5, \"yieldClass\": \"high\"}}",
        "Thought: Do I need to use a tool? No\nFinal Answer: Loan Approved! Interest Rate: 8.5%. Funds will be disbursed shortly.",
        "Great news Raju, your loan is approved at 8.5% interest! The money will reach your account soon.",
    ]));

    let store = Arc::new(InMemoryLoanStore::new());
    let registry = create_default_registry(store.clone());
    let reasoning = ReasoningLoop::new(oracle, registry);
    let speech = SpeechSynthesizer::new(Arc::new(EchoProvider), Arc::new(InMemoryCache::new()));
    let history = HistoryStore::new(Arc::new(InMemoryCache::new()));

    let orchestrator = TurnOrchestrator::new(
        reasoning,
        speech,
        store.clone(),
        history,
        Arc::new(NullNotifier),
    );

    let transcript = "I want a loan for my 3 acre farm";
    info!(transcript = %transcript, "Running turn");

    match orchestrator.run_turn(transcript, "demo-user").await {
        Ok(result) => {
            println!("\n=== TURN RESULT ===");
            println!("Transcription: {}", result.transcription);
            println!("Response: {}", result.response_text);
            println!("Audio URL: {}", result.audio_url);

            let applications = store.applications_for_user("demo-user").await?;
            println!("\nPersisted applications:");
            for app in applications {
                println!(
                    "  {} | {} | score {} | rate {:?}",
                    app.application_id, app.status, app.risk_score, app.interest_rate
                );
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Turn failed: {}", e);
            Err(Box::new(e) as Box<dyn std::error::Error>)
        }
    }
}
