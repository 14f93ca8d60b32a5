use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::metrics::StepMetrics;
use crate::model::{AgentRun, AgentStep};
use crate::serve::error::{ApiError, ApiResult};
use crate::serve::session::{non_empty, require_session};
use crate::serve::AppState;

#[derive(Deserialize)]
pub struct RunDetailsParams {
    pub run_id: Option<String>,
}

#[derive(Serialize)]
pub struct RunDetailsResponse {
    pub run: AgentRun,
    pub steps: Vec<AgentStep>,
    pub metrics: StepMetrics,
}

/// Parse a run id; anything that is not a UUID cannot name a run.
pub(super) fn parse_run_id(raw: Option<String>, missing: &str) -> Result<Uuid, ApiError> {
    let raw = non_empty(raw).ok_or_else(|| ApiError::BadRequest(missing.to_string()))?;
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::NotFound("Run not found".into()))
}

/// GET /api/run-details?run_id=: one run with its ordered steps.
pub async fn run_details(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<RunDetailsParams>,
) -> ApiResult<RunDetailsResponse> {
    let session = require_session(state.store.as_ref(), &headers).await?;
    let run_id = parse_run_id(params.run_id, "Missing run_id parameter")?;

    let run = state
        .store
        .get_run(session.id, run_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Run not found".into()))?;
    let steps = state.store.list_steps(run.id).await?;
    let metrics = StepMetrics::from_steps(&run, &steps);

    Ok(Json(RunDetailsResponse { run, steps, metrics }))
}
