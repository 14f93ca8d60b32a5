//! Aggregates derived from run and step rows. Nothing here is persisted.

use serde::Serialize;

use crate::model::{AgentRun, AgentStep, RunStatus};

/// Steps below this confidence are flagged in run detail.
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.6;
/// Steps slower than this are flagged in run detail.
pub const HIGH_LATENCY_THRESHOLD_MS: i32 = 500;

/// Dashboard metrics over all runs of a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunMetrics {
    pub total_runs: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub failure_rate: f64,
    pub avg_confidence: f64,
    pub avg_token_usage: f64,
}

impl RunMetrics {
    pub fn from_runs(runs: &[AgentRun]) -> Self {
        let mut success_count = 0;
        let mut failure_count = 0;
        let mut confidence_sum = 0.0;
        let mut token_sum = 0i64;

        for run in runs {
            if run.status == RunStatus::Success {
                success_count += 1;
            } else if run.status.is_failure() {
                failure_count += 1;
            }
            confidence_sum += run.confidence_score.unwrap_or(0.0);
            token_sum += i64::from(run.token_usage.unwrap_or(0));
        }

        let total_runs = runs.len();
        if total_runs == 0 {
            return Self::default();
        }
        let total = total_runs as f64;

        Self {
            total_runs,
            success_count,
            failure_count,
            failure_rate: failure_count as f64 / total * 100.0,
            avg_confidence: confidence_sum / total,
            avg_token_usage: token_sum as f64 / total,
        }
    }
}

/// Per-run metrics shown next to the step trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepMetrics {
    pub total_latency_ms: i64,
    pub avg_step_confidence: f64,
    pub steps_count: usize,
    pub low_confidence_steps: usize,
    pub high_latency_steps: usize,
    pub can_replay: bool,
}

impl StepMetrics {
    pub fn from_steps(run: &AgentRun, steps: &[AgentStep]) -> Self {
        let low_confidence_steps = steps
            .iter()
            .filter(|s| s.confidence.unwrap_or(0.0) < LOW_CONFIDENCE_THRESHOLD)
            .count();
        let high_latency_steps = steps
            .iter()
            .filter(|s| s.latency_ms.unwrap_or(0) > HIGH_LATENCY_THRESHOLD_MS)
            .count();

        Self {
            total_latency_ms: total_latency_ms(steps),
            avg_step_confidence: mean_confidence(steps),
            steps_count: steps.len(),
            low_confidence_steps,
            high_latency_steps,
            can_replay: run.replay_count == 0,
        }
    }
}

/// Mean of step confidences, missing values counted as 0. Zero for no steps.
pub fn mean_confidence(steps: &[AgentStep]) -> f64 {
    if steps.is_empty() {
        return 0.0;
    }
    let sum: f64 = steps.iter().map(|s| s.confidence.unwrap_or(0.0)).sum();
    sum / steps.len() as f64
}

pub fn total_latency_ms(steps: &[AgentStep]) -> i64 {
    steps
        .iter()
        .map(|s| i64::from(s.latency_ms.unwrap_or(0)))
        .sum()
}
