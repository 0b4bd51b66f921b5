//! Document store catalog handler

use axum::{extract::State, Json};
use graphrag_common::errors::{AppError, Result};
use graphrag_common::models::StoreInfo;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct StoresResponse {
    pub stores: Vec<StoreInfo>,
    pub total: usize,
}

/// List the document stores sessions can select
pub async fn list_stores(State(state): State<AppState>) -> Result<Json<StoresResponse>> {
    let timeout = state.config.request_timeout();
    let stores = tokio::time::timeout(timeout, state.catalog.list())
        .await
        .map_err(|_| AppError::Timeout {
            service: "store_catalog".to_string(),
            timeout_ms: timeout.as_millis() as u64,
        })??;
    Ok(Json(StoresResponse {
        total: stores.len(),
        stores,
    }))
}
