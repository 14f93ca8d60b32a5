//! Synthesizes the fixed five-step research trace for a query.
//!
//! Only the reasoning step talks to the outside world, and any failure there
//! is replaced with canned output. `execute` is infallible.

use std::time::Instant;

use serde_json::{json, Value};
use uuid::Uuid;

use crate::metrics::{mean_confidence, total_latency_ms};
use crate::model::{AgentStep, StepType};
use crate::reasoning::Reasoner;

/// Reported when the reasoner gives no usage, or is not configured.
pub const DEFAULT_TOKEN_USAGE: i32 = 150;
/// Confidence recorded on a run whose steps could not be stored.
pub const FAILED_RUN_CONFIDENCE: f64 = 0.3;

const REASONING_CONFIDENCE: f64 = 0.85;
const PARSED_REASONING_CONFIDENCE: f64 = 0.91;
const MAX_ANALYSIS_CHARS: usize = 500;

/// Steps and summary numbers produced for one run.
#[derive(Debug, Clone)]
pub struct Execution {
    pub steps: Vec<AgentStep>,
    pub confidence_score: f64,
    pub total_latency_ms: i64,
    pub token_usage: i32,
}

/// Outcome of the reasoning step.
#[derive(Debug, Clone, PartialEq)]
struct Reasoning {
    output: Value,
    analysis: String,
    key_points: Vec<Value>,
    confidence: f64,
    total_tokens: Option<i32>,
}

impl Reasoning {
    fn canned() -> Self {
        Self {
            output: json!({ "analysis": "Synthesizing information...", "key_points": [] }),
            analysis: "Synthesizing information...".to_string(),
            key_points: Vec::new(),
            confidence: REASONING_CONFIDENCE,
            total_tokens: None,
        }
    }

    /// Interpret the endpoint's text. Structured JSON is kept verbatim;
    /// free text is truncated and given stock key points.
    fn from_content(content: &str, total_tokens: Option<i32>) -> Self {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(strip_code_fence(content)) {
            let analysis = map
                .get("analysis")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let key_points = map
                .get("key_points")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            return Self {
                output: Value::Object(map),
                analysis,
                key_points,
                confidence: PARSED_REASONING_CONFIDENCE,
                total_tokens,
            };
        }

        let analysis: String = content.chars().take(MAX_ANALYSIS_CHARS).collect();
        let key_points = vec![
            json!("Analysis completed"),
            json!("Results synthesized"),
            json!("Ready for output"),
        ];
        Self {
            output: json!({ "analysis": analysis, "key_points": key_points }),
            analysis,
            key_points,
            confidence: REASONING_CONFIDENCE,
            total_tokens,
        }
    }
}

/// Models often wrap JSON answers in a markdown fence.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

async fn reason(query: &str, reasoner: Option<&dyn Reasoner>) -> Reasoning {
    let Some(reasoner) = reasoner else {
        return Reasoning::canned();
    };
    match reasoner.reason(query).await {
        Ok(completion) => Reasoning::from_content(&completion.content, completion.total_tokens),
        Err(e) => {
            tracing::warn!(model = reasoner.model(), error = %e, "reasoning call failed, using canned output");
            Reasoning::canned()
        }
    }
}

fn elapsed_ms(start: Instant, base: i32) -> i32 {
    let elapsed = i32::try_from(start.elapsed().as_millis()).unwrap_or(i32::MAX);
    elapsed.saturating_add(base)
}

#[allow(clippy::too_many_arguments)]
fn step(
    run_id: Uuid,
    index: i32,
    step_type: StepType,
    tool_name: Option<&str>,
    input: Value,
    output: Value,
    latency_ms: i32,
    confidence: f64,
) -> AgentStep {
    AgentStep {
        id: Uuid::new_v4(),
        agent_run_id: run_id,
        step_index: index,
        step_type,
        tool_name: tool_name.map(str::to_string),
        input,
        output,
        latency_ms: Some(latency_ms),
        confidence: Some(confidence),
    }
}

/// Produce the trace prompt → tool_call → tool_result → reasoning → output.
pub async fn execute(run_id: Uuid, query: &str, reasoner: Option<&dyn Reasoner>) -> Execution {
    let mut steps = Vec::with_capacity(5);

    let start = Instant::now();
    steps.push(step(
        run_id,
        0,
        StepType::Prompt,
        None,
        json!({ "query": query }),
        json!({ "processed_query": query, "intent": "research_request" }),
        elapsed_ms(start, 45),
        0.95,
    ));

    let start = Instant::now();
    steps.push(step(
        run_id,
        1,
        StepType::ToolCall,
        Some("web_search"),
        json!({ "search_query": query, "max_results": 5 }),
        json!({
            "results": [
                {
                    "title": "Recent developments in AI",
                    "url": "https://example.com/ai-news",
                    "snippet": "Latest AI research..."
                },
                {
                    "title": "Research findings",
                    "url": "https://example.com/research",
                    "snippet": "Key findings include..."
                }
            ],
            "result_count": 5
        }),
        elapsed_ms(start, 312),
        0.88,
    ));

    let start = Instant::now();
    steps.push(step(
        run_id,
        2,
        StepType::ToolResult,
        Some("web_search"),
        json!({ "results_to_process": 5 }),
        json!({
            "extracted_facts": 3,
            "relevance_scores": [0.92, 0.87, 0.84, 0.76, 0.71],
            "summary": "Found relevant information across 5 sources"
        }),
        elapsed_ms(start, 89),
        0.86,
    ));

    let start = Instant::now();
    let reasoning = reason(query, reasoner).await;
    steps.push(step(
        run_id,
        3,
        StepType::Reasoning,
        None,
        json!({ "context": "Analyzing search results and synthesizing response" }),
        reasoning.output.clone(),
        elapsed_ms(start, 450),
        reasoning.confidence,
    ));

    let start = Instant::now();
    let response = if reasoning.analysis.is_empty() {
        "Research completed successfully".to_string()
    } else {
        reasoning.analysis.clone()
    };
    steps.push(step(
        run_id,
        4,
        StepType::Output,
        None,
        json!({ "format": "structured_response" }),
        json!({
            "response": response,
            "sources_used": 3,
            "confidence_level": "high",
            "key_findings": reasoning.key_points
        }),
        elapsed_ms(start, 23),
        0.89,
    ));

    Execution {
        confidence_score: mean_confidence(&steps),
        total_latency_ms: total_latency_ms(&steps),
        token_usage: reasoning.total_tokens.unwrap_or(DEFAULT_TOKEN_USAGE),
        steps,
    }
}
