use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Store, StoreError};
use crate::model::{
    AgentRun, AgentStep, DemoSession, NewRun, NewSession, RunCompletion, RunStatus,
};

#[derive(Default)]
struct Tables {
    sessions: HashMap<Uuid, DemoSession>,
    /// Insertion order doubles as creation order.
    runs: Vec<AgentRun>,
    steps: Vec<AgentStep>,
}

impl Tables {
    fn insert_run(&mut self, new: NewRun) -> Result<AgentRun, StoreError> {
        if !self.sessions.contains_key(&new.demo_session_id) {
            return Err(StoreError::MissingParent(format!(
                "demo session {}",
                new.demo_session_id
            )));
        }
        let run = AgentRun {
            id: Uuid::new_v4(),
            demo_session_id: new.demo_session_id,
            agent_name: new.agent_name,
            status: RunStatus::Running,
            input_query: new.input_query,
            confidence_score: None,
            token_usage: None,
            replay_count: 0,
            started_at: Utc::now(),
            completed_at: None,
            error_message: None,
        };
        self.runs.push(run.clone());
        Ok(run)
    }
}

/// Process-local store. Each operation runs under one lock, so the
/// conditional increments are atomic here just as they are in Postgres.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn create_session(&self, new: NewSession) -> Result<DemoSession, StoreError> {
        let session = DemoSession {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            company: new.company,
            role: new.role,
            evaluation_notes: new.evaluation_notes,
            run_count: 0,
            created_at: Utc::now(),
            expires_at: new.expires_at,
        };
        let mut tables = self.tables.lock().await;
        tables.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<DemoSession>, StoreError> {
        Ok(self.tables.lock().await.sessions.get(&id).cloned())
    }

    async fn increment_run_count(&self, id: Uuid, limit: Option<i32>) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        let Some(session) = tables.sessions.get_mut(&id) else {
            return Ok(false);
        };
        if limit.is_some_and(|max| session.run_count >= max) {
            return Ok(false);
        }
        session.run_count += 1;
        Ok(true)
    }

    async fn create_run(&self, new: NewRun) -> Result<AgentRun, StoreError> {
        let mut tables = self.tables.lock().await;
        tables.insert_run(new)
    }

    async fn complete_run(&self, id: Uuid, completion: RunCompletion) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let run = tables
            .runs
            .iter_mut()
            .find(|r| r.id == id && !r.status.is_terminal())
            .ok_or(StoreError::RunNotOpen(id))?;
        run.status = completion.status;
        run.confidence_score = Some(completion.confidence_score);
        run.token_usage = completion.token_usage;
        run.error_message = completion.error_message;
        run.completed_at = Some(completion.completed_at);
        Ok(())
    }

    async fn get_run(&self, session_id: Uuid, run_id: Uuid) -> Result<Option<AgentRun>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .runs
            .iter()
            .find(|r| r.id == run_id && r.demo_session_id == session_id)
            .cloned())
    }

    async fn list_runs(&self, session_id: Uuid) -> Result<Vec<AgentRun>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .runs
            .iter()
            .rev()
            .filter(|r| r.demo_session_id == session_id)
            .cloned()
            .collect())
    }

    async fn start_replay(&self, original: &AgentRun) -> Result<Option<AgentRun>, StoreError> {
        let mut tables = self.tables.lock().await;
        match tables.runs.iter().find(|r| r.id == original.id) {
            Some(r) if r.replay_count == 0 => {}
            Some(_) => return Ok(None),
            None => return Err(StoreError::MissingParent(format!("run {}", original.id))),
        }

        let replay = tables.insert_run(NewRun {
            demo_session_id: original.demo_session_id,
            agent_name: original.agent_name.clone(),
            input_query: original.input_query.clone(),
        })?;
        if let Some(run) = tables.runs.iter_mut().find(|r| r.id == original.id) {
            run.replay_count += 1;
        }
        if let Some(session) = tables.sessions.get_mut(&original.demo_session_id) {
            session.run_count += 1;
        }
        Ok(Some(replay))
    }

    async fn insert_steps(&self, steps: &[AgentStep]) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;

        let mut seen: HashSet<(Uuid, i32)> = tables
            .steps
            .iter()
            .map(|s| (s.agent_run_id, s.step_index))
            .collect();
        for step in steps {
            if !tables.runs.iter().any(|r| r.id == step.agent_run_id) {
                return Err(StoreError::MissingParent(format!("run {}", step.agent_run_id)));
            }
            if !seen.insert((step.agent_run_id, step.step_index)) {
                return Err(StoreError::DuplicateStep {
                    run_id: step.agent_run_id,
                    index: step.step_index,
                });
            }
        }

        tables.steps.extend_from_slice(steps);
        Ok(())
    }

    async fn list_steps(&self, run_id: Uuid) -> Result<Vec<AgentStep>, StoreError> {
        let tables = self.tables.lock().await;
        let mut steps: Vec<AgentStep> = tables
            .steps
            .iter()
            .filter(|s| s.agent_run_id == run_id)
            .cloned()
            .collect();
        steps.sort_by_key(|s| s.step_index);
        Ok(steps)
    }
}
