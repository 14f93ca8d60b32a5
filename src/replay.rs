//! Copies a run's trace into a new run with small random jitter.

use rand::Rng;
use uuid::Uuid;

use crate::model::AgentStep;

/// Latency used for steps that never recorded one.
pub const DEFAULT_LATENCY_MS: i32 = 100;
/// Confidence used for steps that never recorded one.
pub const DEFAULT_CONFIDENCE: f64 = 0.8;

const LATENCY_JITTER: f64 = 0.1;
const CONFIDENCE_JITTER: f64 = 0.05;

/// Duplicate `steps` under `new_run_id`, ordered by step index.
///
/// Latency is scaled by a factor in [0.9, 1.1] and rounded; confidence is
/// shifted by a delta in [-0.05, 0.05] and clamped to [0, 1]. Everything
/// else is copied as-is.
pub fn perturb_steps<R: Rng>(
    new_run_id: Uuid,
    steps: &[AgentStep],
    rng: &mut R,
) -> Vec<AgentStep> {
    let mut ordered: Vec<&AgentStep> = steps.iter().collect();
    ordered.sort_by_key(|s| s.step_index);

    ordered
        .into_iter()
        .map(|step| {
            let factor = rng.gen_range(1.0 - LATENCY_JITTER..=1.0 + LATENCY_JITTER);
            let latency = f64::from(step.latency_ms.unwrap_or(DEFAULT_LATENCY_MS)) * factor;

            let delta = rng.gen_range(-CONFIDENCE_JITTER..=CONFIDENCE_JITTER);
            let confidence = (step.confidence.unwrap_or(DEFAULT_CONFIDENCE) + delta).clamp(0.0, 1.0);

            AgentStep {
                id: Uuid::new_v4(),
                agent_run_id: new_run_id,
                step_index: step.step_index,
                step_type: step.step_type,
                tool_name: step.tool_name.clone(),
                input: step.input.clone(),
                output: step.output.clone(),
                latency_ms: Some(latency.round() as i32),
                confidence: Some(confidence),
            }
        })
        .collect()
}
