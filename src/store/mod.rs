//! Persistence for sessions, runs and steps.
//!
//! `PgStore` is the production backend. `MemoryStore` keeps everything in
//! process and backs `serve --in-memory` and the tests.

pub mod memory;
pub mod pool;
pub mod pg;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::model::{AgentRun, AgentStep, DemoSession, NewRun, NewSession, RunCompletion};

pub use memory::MemoryStore;
pub use pool::Pool;
pub use pg::PgStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("invalid row: {0}")]
    InvalidRow(String),

    #[error("run {0} is missing or already finished")]
    RunNotOpen(Uuid),

    #[error("run {run_id} already has a step at index {index}")]
    DuplicateStep { run_id: Uuid, index: i32 },

    #[error("{0} does not exist")]
    MissingParent(String),
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Short backend name reported by the health endpoint.
    fn backend(&self) -> &'static str;

    async fn create_session(&self, new: NewSession) -> Result<DemoSession, StoreError>;

    async fn get_session(&self, id: Uuid) -> Result<Option<DemoSession>, StoreError>;

    /// Add one to the session's run count. With a `limit`, the increment only
    /// happens while the count is below it; returns whether it happened.
    async fn increment_run_count(&self, id: Uuid, limit: Option<i32>) -> Result<bool, StoreError>;

    /// Insert a run in the `running` state.
    async fn create_run(&self, new: NewRun) -> Result<AgentRun, StoreError>;

    /// Move a `pending` or `running` run to its terminal state.
    async fn complete_run(&self, id: Uuid, completion: RunCompletion) -> Result<(), StoreError>;

    /// A run, only if it belongs to `session_id`.
    async fn get_run(&self, session_id: Uuid, run_id: Uuid) -> Result<Option<AgentRun>, StoreError>;

    /// All runs of a session, newest first.
    async fn list_runs(&self, session_id: Uuid) -> Result<Vec<AgentRun>, StoreError>;

    /// Atomically bump the original's `replay_count` from 0 to 1, insert the
    /// replay run in the `running` state and count it against the session.
    /// Returns `None`, changing nothing, if the original was already replayed.
    async fn start_replay(&self, original: &AgentRun) -> Result<Option<AgentRun>, StoreError>;

    /// Batch insert; either every step is stored or none is.
    async fn insert_steps(&self, steps: &[AgentStep]) -> Result<(), StoreError>;

    /// Steps of a run ordered by step index.
    async fn list_steps(&self, run_id: Uuid) -> Result<Vec<AgentStep>, StoreError>;
}
