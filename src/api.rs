//! REST API server for the loan voice agent
//!
//! Exposes the turn orchestrator via HTTP. Transcription happens upstream
//! (the STT collaborator); this surface accepts text transcripts.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::agent::TurnOrchestrator;
use crate::error::AgentError;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    pub transcript: String,
    #[serde(rename = "userId")]
    pub user_id: String,
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<TurnOrchestrator>,
}

fn status_for(error: &AgentError) -> StatusCode {
    match error {
        AgentError::ValidationError(_) => StatusCode::BAD_REQUEST,
        AgentError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        AgentError::TimeoutError(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Uniform failure body. A turn either returns a complete result or this;
/// partial success is never reported.
fn error_body(message: String) -> serde_json::Value {
    json!({
        "success": false,
        "error": message,
    })
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Turn Endpoint
/// =============================

async fn process_turn(
    State(state): State<ApiState>,
    Json(req): Json<TurnRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    info!(user_id = %req.user_id, "Received turn request");

    match state
        .orchestrator
        .run_turn(&req.transcript, &req.user_id)
        .await
    {
        Ok(result) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "transcription": result.transcription,
                "response": result.response_text,
                "audioUrl": result.audio_url,
            })),
        ),
        Err(e) => (status_for(&e), Json(error_body(e.to_string()))),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(orchestrator: Arc<TurnOrchestrator>) -> Router {
    let state = ApiState { orchestrator };

    Router::new()
        .route("/health", axum::routing::get(health))
        .route("/api/turn", post(process_turn))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    orchestrator: Arc<TurnOrchestrator>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(orchestrator);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&AgentError::ValidationError("missing".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&AgentError::RateLimited("busy".into())),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status_for(&AgentError::TimeoutError("slow".into())),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_for(&AgentError::TtsError("down".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_uniform_failure_body() {
        let body = error_body("Validation error: Missing transcript or userId".into());
        assert_eq!(body["success"], false);
        assert_eq!(
            body["error"],
            "Validation error: Missing transcript or userId"
        );
        assert!(body.get("transcription").is_none());
    }

    #[test]
    fn test_turn_request_wire_names() {
        let req: TurnRequest = serde_json::from_str(
            r#"{"transcript": "I want a loan", "userId": "user-123"}"#,
        )
        .unwrap();
        assert_eq!(req.transcript, "I want a loan");
        assert_eq!(req.user_id, "user-123");
    }
}
