use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::run_details::parse_run_id;
use crate::metrics::{mean_confidence, total_latency_ms};
use crate::model::{RunCompletion, RunStatus};
use crate::replay::perturb_steps;
use crate::serve::error::{ApiError, ApiResult};
use crate::serve::session::{parse_body, require_session};
use crate::serve::AppState;

#[derive(Deserialize)]
pub struct ReplayRequest {
    pub run_id: Option<String>,
}

#[derive(Serialize)]
pub struct ReplayResponse {
    pub original_run_id: Uuid,
    pub replayed_run_id: Uuid,
    pub status: RunStatus,
    pub confidence_score: f64,
    pub total_latency_ms: i64,
    pub steps_count: usize,
}

/// POST /api/replay-run: clone a run's trace with jitter, once per run.
pub async fn replay_run(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<ReplayResponse> {
    let store = state.store.as_ref();
    let session = require_session(store, &headers).await?;

    let req: ReplayRequest = parse_body(&body)?;
    let run_id = parse_run_id(req.run_id, "Missing run_id")?;

    let original = store
        .get_run(session.id, run_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Run not found".into()))?;

    let already_replayed = || ApiError::TooManyRequests("Run has already been replayed once".into());
    if original.replay_count >= 1 {
        return Err(already_replayed());
    }

    let steps = store.list_steps(original.id).await?;

    // Only one concurrent request can move replay_count off zero. The replay
    // counts toward the session's runs but is not quota-checked.
    let replayed = store
        .start_replay(&original)
        .await?
        .ok_or_else(already_replayed)?;

    let replayed_steps = {
        let mut rng = rand::thread_rng();
        perturb_steps(replayed.id, &steps, &mut rng)
    };
    let confidence_score = mean_confidence(&replayed_steps);

    // A replay is recorded as successful even when its steps could not be stored.
    if let Err(e) = store.insert_steps(&replayed_steps).await {
        tracing::error!(run = %replayed.id, "failed to store replayed steps: {}", e);
    }
    let completion = RunCompletion {
        status: RunStatus::Success,
        confidence_score,
        token_usage: original.token_usage,
        error_message: None,
        completed_at: Utc::now(),
    };
    if let Err(e) = store.complete_run(replayed.id, completion).await {
        tracing::error!(run = %replayed.id, "failed to complete replay: {}", e);
    }

    tracing::info!(original = %original.id, replay = %replayed.id, "Replayed run");

    Ok(Json(ReplayResponse {
        original_run_id: original.id,
        replayed_run_id: replayed.id,
        status: RunStatus::Success,
        confidence_score,
        total_latency_ms: total_latency_ms(&replayed_steps),
        steps_count: replayed_steps.len(),
    }))
}
