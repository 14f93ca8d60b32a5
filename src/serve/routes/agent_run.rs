use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::executor::{self, FAILED_RUN_CONFIDENCE};
use crate::model::{AgentStep, NewRun, RunCompletion, RunStatus, DEFAULT_AGENT_NAME};
use crate::serve::error::{ApiError, ApiResult};
use crate::serve::session::{ensure_active, parse_body, require_session};
use crate::serve::AppState;
use crate::store::Store;

#[derive(Deserialize)]
pub struct RunRequest {
    pub query: Option<String>,
}

#[derive(Serialize)]
pub struct RunResponse {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub confidence_score: f64,
    pub total_latency_ms: i64,
    pub token_usage: i32,
    pub steps_count: usize,
}

/// Final state of a run after its steps were written.
struct Persisted {
    status: RunStatus,
    confidence_score: f64,
}

/// Insert a run's steps and apply its single terminal update.
///
/// A failed insert marks the run `failed`. A failed terminal update is only
/// logged: the run then stays `running`.
async fn persist_trace(
    store: &dyn Store,
    run_id: Uuid,
    steps: &[AgentStep],
    confidence_score: f64,
    token_usage: Option<i32>,
) -> Persisted {
    let (status, confidence_score, error_message) = match store.insert_steps(steps).await {
        Ok(()) => (RunStatus::Success, confidence_score, None),
        Err(e) => {
            tracing::error!(run = %run_id, "failed to store steps: {}", e);
            (RunStatus::Failed, FAILED_RUN_CONFIDENCE, Some(e.to_string()))
        }
    };

    let completion = RunCompletion {
        status,
        confidence_score,
        token_usage,
        error_message,
        completed_at: Utc::now(),
    };
    if let Err(e) = store.complete_run(run_id, completion).await {
        tracing::error!(run = %run_id, "failed to complete run: {}", e);
    }

    Persisted {
        status,
        confidence_score,
    }
}

/// POST /api/agent-run: synthesize and store one agent run.
pub async fn trigger_run(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<RunResponse> {
    let store = state.store.as_ref();
    let session = require_session(store, &headers).await?;
    ensure_active(&session, Utc::now())?;

    let max_runs = state.settings.max_runs_per_session;
    let quota_reached =
        || ApiError::TooManyRequests(format!("Maximum {max_runs} runs per demo session reached"));
    if session.run_count >= max_runs {
        return Err(quota_reached());
    }

    let req: RunRequest = parse_body(&body)?;
    let query = req
        .query
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing query field".into()))?;

    // Conditional increment; a concurrent request may have taken the last slot.
    if !store.increment_run_count(session.id, Some(max_runs)).await? {
        return Err(quota_reached());
    }

    let run = store
        .create_run(NewRun {
            demo_session_id: session.id,
            agent_name: DEFAULT_AGENT_NAME.to_string(),
            input_query: Some(query.clone()),
        })
        .await?;

    let execution = executor::execute(run.id, &query, state.reasoner.as_deref()).await;
    let persisted = persist_trace(
        store,
        run.id,
        &execution.steps,
        execution.confidence_score,
        Some(execution.token_usage),
    )
    .await;

    tracing::info!(run = %run.id, status = %persisted.status, "Agent run completed");

    Ok(Json(RunResponse {
        run_id: run.id,
        status: persisted.status,
        confidence_score: persisted.confidence_score,
        total_latency_ms: execution.total_latency_ms,
        token_usage: execution.token_usage,
        steps_count: execution.steps.len(),
    }))
}
