use agri_loan_orchestrator::{
    agent::TurnOrchestrator,
    api::start_server,
    cache::InMemoryCache,
    history::HistoryStore,
    notify::{AblyNotifier, Notifier, NullNotifier},
    reasoner::{GeminiOracle, ReasoningLoop},
    speech::{MurfClient, SpeechSynthesizer},
    store::{InMemoryLoanStore, LoanStore, PgLoanStore},
    tools::create_default_registry,
};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let gemini_api_key = std::env::var("GEMINI_API_KEY").unwrap_or_else(|_| {
        eprintln!("GEMINI_API_KEY not set in .env; reasoning calls will fail");
        String::new()
    });
    let murf_api_key = std::env::var("MURF_API_KEY").unwrap_or_default();

    let api_port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    info!("Loan Voice Agent - API Server");
    info!("Port: {}", api_port);

    // Persistence backend: Postgres when configured, in-memory otherwise.
    let store: Arc<dyn LoanStore> = match std::env::var("DATABASE_URL")
        .or_else(|_| std::env::var("POSTGRES_URL"))
    {
        Ok(url) => match PgLoanStore::connect(&url) {
            Ok(store) => Arc::new(store),
            Err(error) => {
                warn!(
                    "Failed to configure postgres store, falling back to in-memory: {}",
                    error
                );
                Arc::new(InMemoryLoanStore::new())
            }
        },
        Err(_) => {
            info!("Loan store backend: in-memory");
            Arc::new(InMemoryLoanStore::new())
        }
    };

    // Notification transport is optional in development.
    let notifier: Arc<dyn Notifier> = match std::env::var("ABLY_API_KEY") {
        Ok(key) if !key.is_empty() => Arc::new(AblyNotifier::new(key)),
        _ => {
            warn!("ABLY_API_KEY not set; notifications disabled");
            Arc::new(NullNotifier)
        }
    };

    // Shared TTL cache for history blobs and TTS URLs.
    let cache = Arc::new(InMemoryCache::new());

    let registry = create_default_registry(store.clone());
    let reasoning = ReasoningLoop::new(Arc::new(GeminiOracle::new(gemini_api_key)), registry);
    let speech = SpeechSynthesizer::new(Arc::new(MurfClient::new(murf_api_key)), cache.clone());
    let history = HistoryStore::new(cache);

    let orchestrator = Arc::new(TurnOrchestrator::new(
        reasoning, speech, store, history, notifier,
    ));

    info!("Orchestrator initialized");
    info!("Starting API server...");

    start_server(orchestrator, api_port).await?;

    Ok(())
}
