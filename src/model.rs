//! Row types shared by the store, the HTTP layer and the CLI.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Agent name given to every synthesized run.
pub const DEFAULT_AGENT_NAME: &str = "Research Agent";

/// Lifecycle of an agent run: `pending → running → {success|failed|timeout}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Success,
    Failed,
    Timeout,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
            RunStatus::Timeout => "timeout",
        }
    }

    /// Terminal states are final; nothing transitions out of them.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Success | RunStatus::Failed | RunStatus::Timeout
        )
    }

    /// Counted against the failure rate.
    pub fn is_failure(self) -> bool {
        matches!(self, RunStatus::Failed | RunStatus::Timeout)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RunStatus::Pending),
            "running" => Ok(RunStatus::Running),
            "success" => Ok(RunStatus::Success),
            "failed" => Ok(RunStatus::Failed),
            "timeout" => Ok(RunStatus::Timeout),
            other => Err(format!("unknown run status '{other}'")),
        }
    }
}

/// Phase of a step within a run trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Prompt,
    ToolCall,
    ToolResult,
    Reasoning,
    Output,
}

impl StepType {
    pub fn as_str(self) -> &'static str {
        match self {
            StepType::Prompt => "prompt",
            StepType::ToolCall => "tool_call",
            StepType::ToolResult => "tool_result",
            StepType::Reasoning => "reasoning",
            StepType::Output => "output",
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prompt" => Ok(StepType::Prompt),
            "tool_call" => Ok(StepType::ToolCall),
            "tool_result" => Ok(StepType::ToolResult),
            "reasoning" => Ok(StepType::Reasoning),
            "output" => Ok(StepType::Output),
            other => Err(format!("unknown step type '{other}'")),
        }
    }
}

/// A time-boxed, quota-limited guest identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemoSession {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub company: String,
    pub role: String,
    pub evaluation_notes: Option<String>,
    pub run_count: i32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl DemoSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Fields supplied when a session is requested.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub name: String,
    pub email: String,
    pub company: String,
    pub role: String,
    pub evaluation_notes: Option<String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRun {
    pub id: Uuid,
    pub demo_session_id: Uuid,
    pub agent_name: String,
    pub status: RunStatus,
    pub input_query: Option<String>,
    pub confidence_score: Option<f64>,
    pub token_usage: Option<i32>,
    pub replay_count: i32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

/// A run about to be created in the `running` state.
#[derive(Debug, Clone)]
pub struct NewRun {
    pub demo_session_id: Uuid,
    pub agent_name: String,
    pub input_query: Option<String>,
}

/// The single terminal update applied to a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunCompletion {
    pub status: RunStatus,
    pub confidence_score: f64,
    pub token_usage: Option<i32>,
    pub error_message: Option<String>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStep {
    pub id: Uuid,
    pub agent_run_id: Uuid,
    pub step_index: i32,
    pub step_type: StepType,
    pub tool_name: Option<String>,
    pub input: Value,
    pub output: Value,
    pub latency_ms: Option<i32>,
    pub confidence: Option<f64>,
}
