//! Session management handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use graphrag_common::errors::{AppError, Result};
use graphrag_context::SessionSnapshot;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::state::AppState;

/// Store selection request; an empty list means "use the default store"
#[derive(Debug, Deserialize, Validate)]
pub struct SelectStoresRequest {
    #[validate(length(max = 50))]
    #[serde(default)]
    pub store_ids: Vec<String>,
}

/// Create a new session
pub async fn create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionSnapshot>)> {
    let session = state.sessions.create().await;
    Ok((StatusCode::CREATED, Json(session.snapshot())))
}

/// Get session history and store selection
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>> {
    let session = state.sessions.get(session_id).await?;
    let snapshot = session.lock().await.snapshot();
    Ok(Json(snapshot))
}

/// End a session
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode> {
    if state.sessions.remove(session_id).await {
        tracing::info!(session_id = %session_id, "Session deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::SessionNotFound {
            id: session_id.to_string(),
        })
    }
}

/// Clear conversation history ("new session" without a new id)
pub async fn clear_history(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>> {
    let session = state.sessions.get(session_id).await?;
    let mut session = session.lock().await;
    session.clear_history();

    tracing::info!(session_id = %session_id, "Conversation history cleared");
    Ok(Json(session.snapshot()))
}

/// Choose which document stores the session's vector searches target
pub async fn select_stores(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<SelectStoresRequest>,
) -> Result<Json<SessionSnapshot>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: Some("store_ids".to_string()),
    })?;

    let session = state.sessions.get(session_id).await?;
    let mut session = session.lock().await;
    session.set_selected_stores(&request.store_ids);

    if session.selected_stores().is_empty() {
        tracing::info!(session_id = %session_id, "Vector search will use the default store");
    } else {
        tracing::info!(
            session_id = %session_id,
            stores = session.selected_stores().len(),
            "Vector search store selection updated"
        );
    }

    Ok(Json(session.snapshot()))
}
