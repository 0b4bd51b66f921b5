//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub synthesis: String,
    pub active_sessions: usize,
}

/// Liveness probe - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: graphrag_common::VERSION.to_string(),
    })
}

/// Readiness probe - reports whether answers will be synthesized
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    Json(ReadyResponse {
        status: "ready".to_string(),
        synthesis: if state.agent.has_llm() { "llm" } else { "evidence_only" }.to_string(),
        active_sessions: state.sessions.len().await,
    })
}
