use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::model::NewSession;
use crate::serve::error::{ApiError, ApiResult};
use crate::serve::session::{non_empty, parse_body};
use crate::serve::AppState;

#[derive(Deserialize, Default)]
pub struct DemoAccessRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub company: Option<String>,
    pub role: Option<String>,
    pub notes: Option<String>,
    pub evaluation_notes: Option<String>,
}

#[derive(Serialize)]
pub struct DemoAccessResponse {
    pub demo_session_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub message: String,
}

/// POST /api/demo-access: issue a time-limited demo session.
pub async fn create_session(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult<DemoAccessResponse> {
    let req: DemoAccessRequest = parse_body(&body)?;

    let (Some(name), Some(email), Some(company), Some(role)) = (
        non_empty(req.name),
        non_empty(req.email),
        non_empty(req.company),
        non_empty(req.role),
    ) else {
        return Err(ApiError::BadRequest(
            "Missing required fields: name, email, company, role".into(),
        ));
    };

    let ttl = state.settings.session_ttl;
    let expires_at = Utc::now()
        .checked_add_signed(ttl)
        .ok_or_else(|| ApiError::Internal("Session lifetime is out of range".into()))?;
    let session = state
        .store
        .create_session(NewSession {
            name,
            email,
            company,
            role,
            evaluation_notes: non_empty(req.evaluation_notes).or_else(|| non_empty(req.notes)),
            expires_at,
        })
        .await?;

    tracing::info!(
        session = %session.id,
        "Demo session created for {} at {}",
        session.email,
        session.company
    );

    Ok(Json(DemoAccessResponse {
        demo_session_id: session.id,
        expires_at: session.expires_at,
        message: format!(
            "Demo access granted. Session valid for {} hours.",
            ttl.num_hours()
        ),
    }))
}
