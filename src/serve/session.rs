//! Demo-session gate for the session-scoped endpoints.

use axum::body::Bytes;
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::error::ApiError;
use crate::model::DemoSession;
use crate::store::Store;

pub const DEMO_SESSION_HEADER: &str = "x-demo-session";

/// Read the session id header. `Ok(None)` means present but not a UUID.
fn session_id(headers: &HeaderMap) -> Result<Option<Uuid>, ApiError> {
    let value = headers
        .get(DEMO_SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Missing X-Demo-Session header".into()))?;
    Ok(Uuid::parse_str(value).ok())
}

/// Resolve the caller's session: a missing header or unknown session is 401.
/// Expired sessions still resolve, so their history stays readable.
pub async fn require_session(store: &dyn Store, headers: &HeaderMap) -> Result<DemoSession, ApiError> {
    let invalid = || ApiError::Unauthorized("Invalid demo session".into());

    let id = session_id(headers)?.ok_or_else(invalid)?;
    store.get_session(id).await?.ok_or_else(invalid)
}

/// Refuse new work on an expired session.
pub fn ensure_active(session: &DemoSession, now: DateTime<Utc>) -> Result<(), ApiError> {
    if session.is_expired(now) {
        return Err(ApiError::Unauthorized("Demo session expired".into()));
    }
    Ok(())
}

/// Parse a JSON request body, reporting malformed input as 400.
pub fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {e}")))
}

/// Treat absent, empty and whitespace-only strings alike.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
