//! Streaming chat handler
//!
//! Answers are relayed as server-sent events:
//! `token` for answer fragments, `notice` for the evidence-only fallback,
//! `error` for a failed synthesis, and a final `done`.

use async_stream::stream;
use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{Stream, StreamExt};
use graphrag_common::errors::{AppError, Result};
use graphrag_context::AnswerChunk;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use uuid::Uuid;
use validator::Validate;

use crate::state::AppState;

/// Chat request
#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 4000))]
    pub message: String,
}

#[derive(Serialize)]
struct EventPayload<'a> {
    text: &'a str,
}

fn to_event(chunk: &AnswerChunk) -> Event {
    let name = match chunk {
        AnswerChunk::Token(_) => "token",
        AnswerChunk::Notice(_) => "notice",
        AnswerChunk::Error(_) => "error",
    };

    Event::default()
        .event(name)
        .json_data(EventPayload { text: chunk.text() })
        .unwrap_or_else(|_| Event::default().event("error").data("unserializable chunk"))
}

/// Ask a question within a session and stream the answer
pub async fn chat(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: Some("message".to_string()),
    })?;

    let query = request.message.trim().to_string();
    if query.is_empty() {
        return Err(AppError::Validation {
            message: "message must not be blank".to_string(),
            field: Some("message".to_string()),
        });
    }

    let session = state.sessions.get(session_id).await?;
    let agent = state.agent.clone();

    tracing::debug!(session_id = %session_id, "Chat request accepted");

    let events = stream! {
        // queries within one session run one at a time
        let mut session = session.lock_owned().await;
        let mut answer = agent.answer(&mut session, &query);

        while let Some(chunk) = answer.next().await {
            yield Ok::<Event, Infallible>(to_event(&chunk));
        }

        yield Ok::<Event, Infallible>(Event::default().event("done").data("[DONE]"));
    };

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
