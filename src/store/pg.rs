use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;
use uuid::Uuid;

use super::pool::Pool;
use super::{Store, StoreError};
use crate::model::{
    AgentRun, AgentStep, DemoSession, NewRun, NewSession, RunCompletion, RunStatus, StepType,
};

/// DDL for all tables, applied by `agentlens migrate`.
pub const SCHEMA: &str = include_str!("schema.sql");

pub const SESSION_COLUMNS: &str =
    "id, name, email, company, role, evaluation_notes, run_count, created_at, expires_at";
pub const RUN_COLUMNS: &str = "id, demo_session_id, agent_name, status, input_query, \
     confidence_score, token_usage, replay_count, started_at, completed_at, error_message";
pub const STEP_COLUMNS: &str =
    "id, agent_run_id, step_index, step_type, tool_name, input, output, latency_ms, confidence";

const STEP_PARAMS: usize = 9;

/// Map a row selected with `SESSION_COLUMNS`.
pub fn session_from_row(row: &Row) -> DemoSession {
    DemoSession {
        id: row.get(0),
        name: row.get(1),
        email: row.get(2),
        company: row.get(3),
        role: row.get(4),
        evaluation_notes: row.get(5),
        run_count: row.get(6),
        created_at: row.get(7),
        expires_at: row.get(8),
    }
}

/// Map a row selected with `RUN_COLUMNS`.
pub fn run_from_row(row: &Row) -> Result<AgentRun, StoreError> {
    let status: String = row.get(3);
    Ok(AgentRun {
        id: row.get(0),
        demo_session_id: row.get(1),
        agent_name: row.get(2),
        status: status.parse::<RunStatus>().map_err(StoreError::InvalidRow)?,
        input_query: row.get(4),
        confidence_score: row.get(5),
        token_usage: row.get(6),
        replay_count: row.get(7),
        started_at: row.get(8),
        completed_at: row.get(9),
        error_message: row.get(10),
    })
}

/// Map a row selected with `STEP_COLUMNS`.
pub fn step_from_row(row: &Row) -> Result<AgentStep, StoreError> {
    let step_type: String = row.get(3);
    Ok(AgentStep {
        id: row.get(0),
        agent_run_id: row.get(1),
        step_index: row.get(2),
        step_type: step_type.parse::<StepType>().map_err(StoreError::InvalidRow)?,
        tool_name: row.get(4),
        input: row.get::<_, Option<Value>>(5).unwrap_or(Value::Null),
        output: row.get::<_, Option<Value>>(6).unwrap_or(Value::Null),
        latency_ms: row.get(7),
        confidence: row.get(8),
    })
}

/// `($1, $2, ...), ($10, ...)` placeholder groups for a multi-row insert.
fn values_placeholders(rows: usize, width: usize) -> String {
    (0..rows)
        .map(|r| {
            let group: Vec<String> = (1..=width).map(|c| format!("${}", r * width + c)).collect();
            format!("({})", group.join(", "))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub struct PgStore {
    pool: Arc<Pool>,
}

impl PgStore {
    pub fn new(pool: Arc<Pool>) -> Self {
        Self { pool }
    }

    pub fn connect_lazy(database_url: &str) -> Self {
        Self::new(Pool::new(database_url))
    }
}

#[async_trait]
impl Store for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn create_session(&self, new: NewSession) -> Result<DemoSession, StoreError> {
        let client = self.pool.get().await?;
        let sql = format!(
            "INSERT INTO demo_sessions (id, name, email, company, role, evaluation_notes, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {SESSION_COLUMNS}"
        );
        let row = client
            .query_one(
                &sql,
                &[
                    &Uuid::new_v4(),
                    &new.name,
                    &new.email,
                    &new.company,
                    &new.role,
                    &new.evaluation_notes,
                    &new.expires_at,
                ],
            )
            .await?;
        Ok(session_from_row(&row))
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<DemoSession>, StoreError> {
        let client = self.pool.get().await?;
        let sql = format!("SELECT {SESSION_COLUMNS} FROM demo_sessions WHERE id = $1");
        let row = client.query_opt(&sql, &[&id]).await?;
        Ok(row.as_ref().map(session_from_row))
    }

    async fn increment_run_count(&self, id: Uuid, limit: Option<i32>) -> Result<bool, StoreError> {
        let client = self.pool.get().await?;
        let updated = client
            .execute(
                "UPDATE demo_sessions SET run_count = run_count + 1 \
                 WHERE id = $1 AND ($2::integer IS NULL OR run_count < $2)",
                &[&id, &limit],
            )
            .await?;
        Ok(updated == 1)
    }

    async fn create_run(&self, new: NewRun) -> Result<AgentRun, StoreError> {
        let client = self.pool.get().await?;
        let sql = format!(
            "INSERT INTO agent_runs (id, demo_session_id, agent_name, status, input_query) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {RUN_COLUMNS}"
        );
        let row = client
            .query_one(
                &sql,
                &[
                    &Uuid::new_v4(),
                    &new.demo_session_id,
                    &new.agent_name,
                    &RunStatus::Running.as_str(),
                    &new.input_query,
                ],
            )
            .await?;
        run_from_row(&row)
    }

    async fn complete_run(&self, id: Uuid, completion: RunCompletion) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        let updated = client
            .execute(
                "UPDATE agent_runs SET status = $2, confidence_score = $3, token_usage = $4, \
                 error_message = $5, completed_at = $6 \
                 WHERE id = $1 AND status IN ('pending', 'running')",
                &[
                    &id,
                    &completion.status.as_str(),
                    &completion.confidence_score,
                    &completion.token_usage,
                    &completion.error_message,
                    &completion.completed_at,
                ],
            )
            .await?;
        if updated == 0 {
            return Err(StoreError::RunNotOpen(id));
        }
        Ok(())
    }

    async fn get_run(&self, session_id: Uuid, run_id: Uuid) -> Result<Option<AgentRun>, StoreError> {
        let client = self.pool.get().await?;
        let sql = format!(
            "SELECT {RUN_COLUMNS} FROM agent_runs WHERE id = $1 AND demo_session_id = $2"
        );
        client
            .query_opt(&sql, &[&run_id, &session_id])
            .await?
            .as_ref()
            .map(run_from_row)
            .transpose()
    }

    async fn list_runs(&self, session_id: Uuid) -> Result<Vec<AgentRun>, StoreError> {
        let client = self.pool.get().await?;
        let sql = format!(
            "SELECT {RUN_COLUMNS} FROM agent_runs WHERE demo_session_id = $1 \
             ORDER BY started_at DESC"
        );
        let rows = client.query(&sql, &[&session_id]).await?;
        rows.iter().map(run_from_row).collect()
    }

    async fn start_replay(&self, original: &AgentRun) -> Result<Option<AgentRun>, StoreError> {
        let client = self.pool.get().await?;
        // One statement: the mark, the run count and the insert commit together.
        let sql = format!(
            "WITH marked AS ( \
                 UPDATE agent_runs SET replay_count = replay_count + 1 \
                 WHERE id = $1 AND replay_count = 0 RETURNING demo_session_id \
             ), counted AS ( \
                 UPDATE demo_sessions SET run_count = run_count + 1 \
                 WHERE id IN (SELECT demo_session_id FROM marked) \
             ) \
             INSERT INTO agent_runs (id, demo_session_id, agent_name, status, input_query) \
             SELECT $2::uuid, demo_session_id, $3::text, $4::text, $5::text FROM marked \
             RETURNING {RUN_COLUMNS}"
        );
        client
            .query_opt(
                &sql,
                &[
                    &original.id,
                    &Uuid::new_v4(),
                    &original.agent_name,
                    &RunStatus::Running.as_str(),
                    &original.input_query,
                ],
            )
            .await?
            .as_ref()
            .map(run_from_row)
            .transpose()
    }

    async fn insert_steps(&self, steps: &[AgentStep]) -> Result<(), StoreError> {
        if steps.is_empty() {
            return Ok(());
        }
        let client = self.pool.get().await?;

        let step_types: Vec<&str> = steps.iter().map(|s| s.step_type.as_str()).collect();
        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(steps.len() * STEP_PARAMS);
        for (step, step_type) in steps.iter().zip(&step_types) {
            params.push(&step.id);
            params.push(&step.agent_run_id);
            params.push(&step.step_index);
            params.push(step_type);
            params.push(&step.tool_name);
            params.push(&step.input);
            params.push(&step.output);
            params.push(&step.latency_ms);
            params.push(&step.confidence);
        }

        // One statement, so the batch is all-or-nothing.
        let sql = format!(
            "INSERT INTO agent_steps ({STEP_COLUMNS}) VALUES {}",
            values_placeholders(steps.len(), STEP_PARAMS)
        );
        client.execute(&sql, &params).await?;
        Ok(())
    }

    async fn list_steps(&self, run_id: Uuid) -> Result<Vec<AgentStep>, StoreError> {
        let client = self.pool.get().await?;
        let sql = format!(
            "SELECT {STEP_COLUMNS} FROM agent_steps WHERE agent_run_id = $1 ORDER BY step_index"
        );
        let rows = client.query(&sql, &[&run_id]).await?;
        rows.iter().map(step_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_number_consecutively() {
        assert_eq!(values_placeholders(1, 3), "($1, $2, $3)");
        assert_eq!(values_placeholders(2, 2), "($1, $2), ($3, $4)");
    }

    #[test]
    fn schema_declares_step_index_uniqueness() {
        assert!(SCHEMA.contains("UNIQUE (agent_run_id, step_index)"));
        assert!(SCHEMA.contains("ON DELETE CASCADE"));
    }
}
