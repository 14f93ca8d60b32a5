pub mod agent_run;
pub mod agent_runs;
pub mod demo_access;
pub mod health;
pub mod replay_run;
pub mod run_details;

use axum::http::{header, HeaderName, Method};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::session::DEMO_SESSION_HEADER;
use super::AppState;

/// Preflight policy shared by every endpoint.
fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            HeaderName::from_static(DEMO_SESSION_HEADER),
        ])
}

/// Build the application router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        // Health
        .route("/health", get(health::health))
        // Session gate
        .route("/demo-access", post(demo_access::create_session))
        // Runs
        .route("/agent-run", post(agent_run::trigger_run))
        .route("/agent-runs", get(agent_runs::list_runs))
        .route("/run-details", get(run_details::run_details))
        .route("/replay-run", post(replay_run::replay_run))
        .with_state(state);

    Router::new()
        .nest("/api", api)
        .layer(cors())
        .layer(TraceLayer::new_for_http())
}
