use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use crate::metrics::RunMetrics;
use crate::model::AgentRun;
use crate::serve::error::ApiResult;
use crate::serve::session::require_session;
use crate::serve::AppState;

#[derive(Serialize)]
pub struct RunsResponse {
    pub runs: Vec<AgentRun>,
    pub metrics: RunMetrics,
}

/// GET /api/agent-runs: all runs of the caller's session, newest first.
pub async fn list_runs(State(state): State<Arc<AppState>>, headers: HeaderMap) -> ApiResult<RunsResponse> {
    let session = require_session(state.store.as_ref(), &headers).await?;
    let runs = state.store.list_runs(session.id).await?;
    let metrics = RunMetrics::from_runs(&runs);
    Ok(Json(RunsResponse { runs, metrics }))
}
