use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::serve::AppState;

/// GET /api/health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "store": state.store.backend(),
        "reasoning": state.reasoner.as_ref().map(|r| r.model().to_string()),
    }))
}
