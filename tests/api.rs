//! End-to-end checks of the HTTP surface against the in-memory store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use agentlens::model::{
    AgentRun, AgentStep, DemoSession, NewRun, NewSession, RunCompletion, RunStatus,
};
use agentlens::reasoning::{Completion, Reasoner, ReasoningError};
use agentlens::serve::config::Settings;
use agentlens::serve::routes::build_router;
use agentlens::serve::AppState;
use agentlens::store::{MemoryStore, Store, StoreError};

struct Canned;

#[async_trait]
impl Reasoner for Canned {
    fn model(&self) -> &str {
        "canned"
    }

    async fn reason(&self, _query: &str) -> Result<Completion, ReasoningError> {
        Ok(Completion {
            content: r#"{"analysis": "Solid", "key_points": ["a", "b", "c"]}"#.into(),
            total_tokens: Some(321),
        })
    }
}

struct Broken;

#[async_trait]
impl Reasoner for Broken {
    fn model(&self) -> &str {
        "broken"
    }

    async fn reason(&self, _query: &str) -> Result<Completion, ReasoningError> {
        Err(ReasoningError::Empty)
    }
}

/// Delegates to a `MemoryStore` but refuses step inserts once
/// `healthy_inserts` batches have gone through.
struct FailingSteps {
    inner: MemoryStore,
    healthy_inserts: usize,
    inserts: AtomicUsize,
}

impl FailingSteps {
    fn after(healthy_inserts: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            healthy_inserts,
            inserts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Store for FailingSteps {
    fn backend(&self) -> &'static str {
        "failing-steps"
    }
    async fn create_session(&self, new: NewSession) -> Result<DemoSession, StoreError> {
        self.inner.create_session(new).await
    }
    async fn get_session(&self, id: Uuid) -> Result<Option<DemoSession>, StoreError> {
        self.inner.get_session(id).await
    }
    async fn increment_run_count(&self, id: Uuid, limit: Option<i32>) -> Result<bool, StoreError> {
        self.inner.increment_run_count(id, limit).await
    }
    async fn create_run(&self, new: NewRun) -> Result<AgentRun, StoreError> {
        self.inner.create_run(new).await
    }
    async fn complete_run(&self, id: Uuid, completion: RunCompletion) -> Result<(), StoreError> {
        self.inner.complete_run(id, completion).await
    }
    async fn get_run(&self, session_id: Uuid, run_id: Uuid) -> Result<Option<AgentRun>, StoreError> {
        self.inner.get_run(session_id, run_id).await
    }
    async fn list_runs(&self, session_id: Uuid) -> Result<Vec<AgentRun>, StoreError> {
        self.inner.list_runs(session_id).await
    }
    async fn start_replay(&self, original: &AgentRun) -> Result<Option<AgentRun>, StoreError> {
        self.inner.start_replay(original).await
    }
    async fn insert_steps(&self, steps: &[AgentStep]) -> Result<(), StoreError> {
        if self.inserts.fetch_add(1, Ordering::SeqCst) >= self.healthy_inserts {
            return Err(StoreError::InvalidRow("step table unavailable".into()));
        }
        self.inner.insert_steps(steps).await
    }
    async fn list_steps(&self, run_id: Uuid) -> Result<Vec<AgentStep>, StoreError> {
        self.inner.list_steps(run_id).await
    }
}

fn app_with(store: Arc<dyn Store>, reasoner: Option<Arc<dyn Reasoner>>) -> Router {
    app_with_settings(store, reasoner, Settings::default())
}

fn app_with_settings(
    store: Arc<dyn Store>,
    reasoner: Option<Arc<dyn Reasoner>>,
    settings: Settings,
) -> Router {
    build_router(Arc::new(AppState::new(store, reasoner, settings)))
}

fn app() -> Router {
    app_with(Arc::new(MemoryStore::new()), Some(Arc::new(Canned)))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    session: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(s) = session {
        req = req.header("X-Demo-Session", s);
    }
    let body = match body {
        Some(v) => {
            req = req.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };

    let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn open_session(app: &Router) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/demo-access",
        None,
        Some(json!({
            "name": "Ada",
            "email": "ada@example.com",
            "company": "Engines Ltd",
            "role": "Engineer",
            "notes": "evaluating tracing"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["demo_session_id"].as_str().unwrap().to_string()
}

async fn start_run(app: &Router, session: &str, query: &str) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        "/api/agent-run",
        Some(session),
        Some(json!({ "query": query })),
    )
    .await
}

#[tokio::test]
async fn health_reports_backend() {
    let (status, body) = send(&app(), Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "memory");
}

#[tokio::test]
async fn demo_access_requires_all_fields() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/demo-access",
        None,
        Some(json!({ "name": "Ada", "email": "ada@example.com", "company": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required fields: name, email, company, role");
}

#[tokio::test]
async fn demo_access_rejects_malformed_json() {
    let app = app();
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/demo-access")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn demo_access_issues_session_in_the_future() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/demo-access",
        None,
        Some(json!({
            "name": "Ada",
            "email": "ada@example.com",
            "company": "Engines Ltd",
            "role": "Engineer"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(Uuid::parse_str(body["demo_session_id"].as_str().unwrap()).is_ok());

    let expires: chrono::DateTime<Utc> = body["expires_at"].as_str().unwrap().parse().unwrap();
    assert!(expires > Utc::now() + Duration::hours(47));
    assert!(body["message"].as_str().unwrap().contains("48 hours"));
}

#[tokio::test]
async fn session_endpoints_reject_bad_sessions() {
    let store = Arc::new(MemoryStore::new());
    let app = app_with(store.clone(), None);

    let (status, body) = send(&app, Method::GET, "/api/agent-runs", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Missing X-Demo-Session header");

    let unknown = Uuid::new_v4().to_string();
    let (status, body) = start_run(&app, &unknown, "q").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid demo session");

    let (status, _) = start_run(&app, "not-a-uuid", "q").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let expired = store
        .create_session(NewSession {
            name: "Old".into(),
            email: "old@example.com".into(),
            company: "Past".into(),
            role: "Ghost".into(),
            evaluation_notes: None,
            expires_at: Utc::now() - Duration::minutes(1),
        })
        .await
        .unwrap();
    let (status, body) = start_run(&app, &expired.id.to_string(), "q").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Demo session expired");
}

#[tokio::test]
async fn expired_session_keeps_its_history() {
    let store = Arc::new(MemoryStore::new());
    let app = app_with(store.clone(), None);
    let session = open_session(&app).await;
    let (_, run) = start_run(&app, &session, "before expiry").await;
    let run_id = run["run_id"].as_str().unwrap().to_string();

    // A session stored with a past expiry holding one finished run.
    let expired = store
        .create_session(NewSession {
            name: "Old".into(),
            email: "old@example.com".into(),
            company: "Past".into(),
            role: "Ghost".into(),
            evaluation_notes: None,
            expires_at: Utc::now() - Duration::minutes(1),
        })
        .await
        .unwrap();
    let old_run = store
        .create_run(NewRun {
            demo_session_id: expired.id,
            agent_name: "Research Agent".into(),
            input_query: Some("history".into()),
        })
        .await
        .unwrap();
    let expired_id = expired.id.to_string();

    let (status, body) = send(&app, Method::GET, "/api/agent-runs", Some(&expired_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metrics"]["total_runs"], 1);

    let uri = format!("/api/run-details?run_id={}", old_run.id);
    let (status, body) = send(&app, Method::GET, &uri, Some(&expired_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["run"]["input_query"], "history");

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/replay-run",
        Some(&expired_id),
        Some(json!({ "run_id": old_run.id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = start_run(&app, &expired_id, "after expiry").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // The live session is unaffected.
    let uri = format!("/api/run-details?run_id={run_id}");
    let (status, _) = send(&app, Method::GET, &uri, Some(&session), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn demo_access_survives_oversized_ttl() {
    let settings = Settings {
        session_ttl: Duration::hours(10_000_000_000),
        ..Settings::default()
    };
    let app = app_with_settings(Arc::new(MemoryStore::new()), None, settings);
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/demo-access",
        None,
        Some(json!({
            "name": "Ada",
            "email": "ada@example.com",
            "company": "Engines Ltd",
            "role": "Engineer"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn demo_access_accepts_either_notes_spelling() {
    let store = Arc::new(MemoryStore::new());
    let app = app_with(store.clone(), None);

    let cases = [
        (json!({ "evaluation_notes": "from the form" }), Some("from the form")),
        (json!({ "notes": "short key" }), Some("short key")),
        (
            json!({ "evaluation_notes": "preferred", "notes": "ignored" }),
            Some("preferred"),
        ),
        (json!({}), None),
    ];
    for (notes, expected) in cases {
        let mut body = json!({
            "name": "Ada",
            "email": "ada@example.com",
            "company": "Engines Ltd",
            "role": "Engineer"
        });
        if let (Some(dst), Some(src)) = (body.as_object_mut(), notes.as_object()) {
            dst.extend(src.clone());
        }

        let (status, resp) = send(&app, Method::POST, "/api/demo-access", None, Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        let id = Uuid::parse_str(resp["demo_session_id"].as_str().unwrap()).unwrap();
        let stored = store.get_session(id).await.unwrap().unwrap();
        assert_eq!(stored.evaluation_notes.as_deref(), expected);
    }
}

#[tokio::test]
async fn agent_run_requires_query() {
    let app = app();
    let session = open_session(&app).await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/agent-run",
        Some(&session),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing query field");

    let (status, _) = start_run(&app, &session, "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // A rejected request does not consume a run.
    let (_, body) = send(&app, Method::GET, "/api/agent-runs", Some(&session), None).await;
    assert_eq!(body["metrics"]["total_runs"], 0);
}

#[tokio::test]
async fn agent_run_keeps_query_verbatim() {
    let app = app();
    let session = open_session(&app).await;

    let (status, run) = start_run(&app, &session, "   ").await;
    assert_eq!(status, StatusCode::OK);

    let uri = format!("/api/run-details?run_id={}", run["run_id"].as_str().unwrap());
    let (_, details) = send(&app, Method::GET, &uri, Some(&session), None).await;
    assert_eq!(details["run"]["input_query"], "   ");
}

#[tokio::test]
async fn agent_run_stores_five_ordered_steps() {
    let app = app();
    let session = open_session(&app).await;

    let (status, run) = start_run(&app, &session, "What changed in AI this week?").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(run["status"], "success");
    assert_eq!(run["steps_count"], 5);
    assert_eq!(run["token_usage"], 321);
    let run_id = run["run_id"].as_str().unwrap();

    let uri = format!("/api/run-details?run_id={run_id}");
    let (status, details) = send(&app, Method::GET, &uri, Some(&session), None).await;
    assert_eq!(status, StatusCode::OK);

    let steps = details["steps"].as_array().unwrap();
    let indices: Vec<i64> = steps.iter().map(|s| s["step_index"].as_i64().unwrap()).collect();
    assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    let types: Vec<&str> = steps.iter().map(|s| s["step_type"].as_str().unwrap()).collect();
    assert_eq!(types, vec!["prompt", "tool_call", "tool_result", "reasoning", "output"]);

    let mean = steps.iter().map(|s| s["confidence"].as_f64().unwrap()).sum::<f64>() / 5.0;
    let stored = details["run"]["confidence_score"].as_f64().unwrap();
    assert!((stored - mean).abs() < 1e-9);
    assert!((run["confidence_score"].as_f64().unwrap() - mean).abs() < 1e-9);

    assert_eq!(details["run"]["status"], "success");
    assert!(details["run"]["completed_at"].is_string());
    assert_eq!(details["metrics"]["steps_count"], 5);
    assert_eq!(details["metrics"]["can_replay"], true);
}

#[tokio::test]
async fn sixth_run_is_rate_limited() {
    let app = app();
    let session = open_session(&app).await;

    for i in 0..5 {
        let (status, _) = start_run(&app, &session, &format!("query {i}")).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = start_run(&app, &session, "one too many").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(body["error"].as_str().unwrap().contains("5"));

    let (_, body) = send(&app, Method::GET, "/api/agent-runs", Some(&session), None).await;
    assert_eq!(body["runs"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn agent_runs_reports_metrics() {
    let app = app();
    let session = open_session(&app).await;
    start_run(&app, &session, "first").await;
    start_run(&app, &session, "second").await;

    let (status, body) = send(&app, Method::GET, "/api/agent-runs", Some(&session), None).await;
    assert_eq!(status, StatusCode::OK);

    let runs = body["runs"].as_array().unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0]["input_query"], "second");

    let metrics = &body["metrics"];
    assert_eq!(metrics["total_runs"], 2);
    assert_eq!(metrics["success_count"], 2);
    assert_eq!(metrics["failure_count"], 0);
    assert_eq!(metrics["failure_rate"].as_f64(), Some(0.0));
    assert_eq!(metrics["avg_token_usage"].as_f64(), Some(321.0));
}

#[tokio::test]
async fn run_details_validates_run_id() {
    let app = app();
    let session = open_session(&app).await;

    let (status, body) = send(&app, Method::GET, "/api/run-details", Some(&session), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing run_id parameter");

    let uri = format!("/api/run-details?run_id={}", Uuid::new_v4());
    let (status, _) = send(&app, Method::GET, &uri, Some(&session), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/run-details?run_id=garbage",
        Some(&session),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn runs_are_scoped_to_their_session() {
    let app = app();
    let owner = open_session(&app).await;
    let stranger = open_session(&app).await;

    let (_, run) = start_run(&app, &owner, "private").await;
    let run_id = run["run_id"].as_str().unwrap();

    let uri = format!("/api/run-details?run_id={run_id}");
    let (status, _) = send(&app, Method::GET, &uri, Some(&stranger), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/replay-run",
        Some(&stranger),
        Some(json!({ "run_id": run_id })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn replay_clones_trace_once() {
    let app = app();
    let session = open_session(&app).await;
    let (_, run) = start_run(&app, &session, "replay me").await;
    let run_id = run["run_id"].as_str().unwrap();

    let uri = format!("/api/run-details?run_id={run_id}");
    let (_, original) = send(&app, Method::GET, &uri, Some(&session), None).await;

    let (status, replay) = send(
        &app,
        Method::POST,
        "/api/replay-run",
        Some(&session),
        Some(json!({ "run_id": run_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replay["original_run_id"], run_id);
    assert_eq!(replay["status"], "success");
    assert_eq!(replay["steps_count"], 5);
    let replay_id = replay["replayed_run_id"].as_str().unwrap();
    assert_ne!(replay_id, run_id);

    let (_, after) = send(&app, Method::GET, &uri, Some(&session), None).await;
    assert_eq!(after["run"]["replay_count"], 1);
    assert_eq!(after["metrics"]["can_replay"], false);

    let uri = format!("/api/run-details?run_id={replay_id}");
    let (_, cloned) = send(&app, Method::GET, &uri, Some(&session), None).await;
    assert_eq!(cloned["run"]["input_query"], "replay me");
    assert_eq!(cloned["run"]["token_usage"], 321);
    assert_eq!(cloned["run"]["replay_count"], 0);

    let before = original["steps"].as_array().unwrap();
    let jittered = cloned["steps"].as_array().unwrap();
    assert_eq!(before.len(), jittered.len());
    for (a, b) in before.iter().zip(jittered) {
        assert_eq!(a["step_index"], b["step_index"]);
        assert_eq!(a["step_type"], b["step_type"]);
        assert_eq!(a["tool_name"], b["tool_name"]);
        assert_eq!(a["input"], b["input"]);
        assert_eq!(a["output"], b["output"]);
        assert_eq!(b["agent_run_id"], replay_id);

        let lat_a = a["latency_ms"].as_f64().unwrap();
        let lat_b = b["latency_ms"].as_f64().unwrap();
        assert!(lat_b >= (lat_a * 0.9).floor() && lat_b <= (lat_a * 1.1).ceil());

        let conf_a = a["confidence"].as_f64().unwrap();
        let conf_b = b["confidence"].as_f64().unwrap();
        assert!((conf_b - conf_a).abs() <= 0.05 + 1e-9);
        assert!((0.0..=1.0).contains(&conf_b));
    }

    // Replays count toward the session's runs.
    let (_, listed) = send(&app, Method::GET, "/api/agent-runs", Some(&session), None).await;
    assert_eq!(listed["metrics"]["total_runs"], 2);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/replay-run",
        Some(&session),
        Some(json!({ "run_id": run_id })),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "Run has already been replayed once");
}

#[tokio::test]
async fn concurrent_replays_admit_one() {
    let app = app();
    let session = open_session(&app).await;
    let (_, run) = start_run(&app, &session, "race").await;
    let body = json!({ "run_id": run["run_id"] });

    let (a, b) = tokio::join!(
        send(&app, Method::POST, "/api/replay-run", Some(&session), Some(body.clone())),
        send(&app, Method::POST, "/api/replay-run", Some(&session), Some(body.clone())),
    );
    let mut statuses = vec![a.0.as_u16(), b.0.as_u16()];
    statuses.sort_unstable();
    assert_eq!(statuses, vec![200, 429]);

    let (_, listed) = send(&app, Method::GET, "/api/agent-runs", Some(&session), None).await;
    assert_eq!(listed["metrics"]["total_runs"], 2);
}

#[tokio::test]
async fn replay_succeeds_when_its_steps_are_lost() {
    // The first batch (the original run) is stored; the replay's is refused.
    let app = app_with(Arc::new(FailingSteps::after(1)), None);
    let session = open_session(&app).await;
    let (_, run) = start_run(&app, &session, "fragile").await;
    assert_eq!(run["status"], "success");
    let run_id = run["run_id"].as_str().unwrap();

    let uri = format!("/api/run-details?run_id={run_id}");
    let (_, original) = send(&app, Method::GET, &uri, Some(&session), None).await;
    let original_mean = original["run"]["confidence_score"].as_f64().unwrap();

    let (status, replay) = send(
        &app,
        Method::POST,
        "/api/replay-run",
        Some(&session),
        Some(json!({ "run_id": run_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replay["status"], "success");
    let confidence = replay["confidence_score"].as_f64().unwrap();
    assert!((confidence - original_mean).abs() <= 0.05 + 1e-9);

    let uri = format!(
        "/api/run-details?run_id={}",
        replay["replayed_run_id"].as_str().unwrap()
    );
    let (_, details) = send(&app, Method::GET, &uri, Some(&session), None).await;
    assert_eq!(details["run"]["status"], "success");
    assert_eq!(details["run"]["confidence_score"].as_f64(), Some(confidence));
    assert!(details["run"]["error_message"].is_null());
}

#[tokio::test]
async fn replay_requires_run_id() {
    let app = app();
    let session = open_session(&app).await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/replay-run",
        Some(&session),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing run_id");
}

#[tokio::test]
async fn failed_step_insert_fails_the_run() {
    let app = app_with(Arc::new(FailingSteps::after(0)), None);
    let session = open_session(&app).await;

    let (status, run) = start_run(&app, &session, "doomed").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(run["status"], "failed");
    assert_eq!(run["confidence_score"].as_f64(), Some(0.3));

    let uri = format!("/api/run-details?run_id={}", run["run_id"].as_str().unwrap());
    let (_, details) = send(&app, Method::GET, &uri, Some(&session), None).await;
    assert_eq!(details["run"]["status"], "failed");
    assert!(details["run"]["error_message"].is_string());
    assert_eq!(details["steps"].as_array().unwrap().len(), 0);

    let (_, listed) = send(&app, Method::GET, "/api/agent-runs", Some(&session), None).await;
    assert_eq!(listed["metrics"]["failure_count"], 1);
    assert_eq!(listed["metrics"]["failure_rate"].as_f64(), Some(100.0));
}

#[tokio::test]
async fn reasoning_outage_falls_back() {
    let app = app_with(Arc::new(MemoryStore::new()), Some(Arc::new(Broken)));
    let session = open_session(&app).await;

    let (status, run) = start_run(&app, &session, "still works").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(run["status"], "success");
    assert_eq!(run["steps_count"], 5);
    assert_eq!(run["token_usage"], 150);
}

#[tokio::test]
async fn preflight_allows_session_header() {
    let req = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/agent-run")
        .header("origin", "https://demo.example.com")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "x-demo-session,content-type")
        .body(Body::empty())
        .unwrap();
    let resp = app().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let headers = resp.headers();
    assert_eq!(headers["access-control-allow-origin"], "*");
    let allowed = headers["access-control-allow-headers"].to_str().unwrap();
    assert!(allowed.contains("x-demo-session"));
}

#[tokio::test]
async fn completed_runs_are_terminal() {
    let app = app();
    let session = open_session(&app).await;
    let (_, run) = start_run(&app, &session, "terminal").await;

    let uri = format!("/api/run-details?run_id={}", run["run_id"].as_str().unwrap());
    let (_, details) = send(&app, Method::GET, &uri, Some(&session), None).await;
    let status: RunStatus = serde_json::from_value(details["run"]["status"].clone()).unwrap();
    assert!(status.is_terminal());
}
