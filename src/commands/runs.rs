use postgres::Client;
use serde_json::json;

use agentlens::metrics::{RunMetrics, StepMetrics};
use agentlens::model::{AgentRun, AgentStep};
use agentlens::store::pg::{run_from_row, step_from_row, RUN_COLUMNS, STEP_COLUMNS};

use super::parse_id;
use crate::output::{cell, print_json, print_rows, OutputFormat};

fn print_metrics<T: serde::Serialize>(metrics: &T, format: &OutputFormat) -> Result<(), String> {
    if matches!(format, OutputFormat::Json) {
        print_json(metrics);
        return Ok(());
    }
    let value = serde_json::to_value(metrics).map_err(|e| format!("Invalid metrics: {e}"))?;
    let rows: Vec<Vec<String>> = value
        .as_object()
        .map(|m| m.iter().map(|(k, v)| vec![k.clone(), v.to_string()]).collect())
        .unwrap_or_default();
    print_rows(&["metric", "value"], &rows, format);
    Ok(())
}

pub fn list(client: &mut Client, session: &str, format: &OutputFormat) -> Result<(), String> {
    let session_id = parse_id("session", session)?;
    let sql = format!(
        "SELECT {RUN_COLUMNS} FROM agent_runs WHERE demo_session_id = $1 ORDER BY started_at DESC"
    );
    let runs: Vec<AgentRun> = client
        .query(&sql, &[&session_id])
        .map_err(|e| format!("Listing runs failed: {e}"))?
        .iter()
        .map(run_from_row)
        .collect::<Result<_, _>>()
        .map_err(|e| e.to_string())?;

    let metrics = RunMetrics::from_runs(&runs);
    if matches!(format, OutputFormat::Json) {
        print_json(&json!({ "runs": runs, "metrics": metrics }));
        return Ok(());
    }

    if runs.is_empty() {
        println!("No runs for session {session_id}.");
    } else {
        let rows: Vec<Vec<String>> = runs
            .iter()
            .map(|r| {
                vec![
                    r.id.to_string(),
                    r.status.to_string(),
                    cell(r.confidence_score.map(|c| format!("{c:.3}"))),
                    cell(r.token_usage),
                    r.replay_count.to_string(),
                    r.started_at.to_rfc3339(),
                    cell(r.input_query.as_deref()),
                ]
            })
            .collect();
        print_rows(
            &["id", "status", "confidence", "tokens", "replays", "started_at", "query"],
            &rows,
            format,
        );
    }
    print_metrics(&metrics, format)
}

pub fn show(client: &mut Client, run: &str, format: &OutputFormat) -> Result<(), String> {
    let run_id = parse_id("run", run)?;

    let sql = format!("SELECT {RUN_COLUMNS} FROM agent_runs WHERE id = $1");
    let row = client
        .query_opt(&sql, &[&run_id])
        .map_err(|e| format!("Loading run failed: {e}"))?
        .ok_or_else(|| format!("Run {run_id} not found"))?;
    let agent_run = run_from_row(&row).map_err(|e| e.to_string())?;

    let sql = format!("SELECT {STEP_COLUMNS} FROM agent_steps WHERE agent_run_id = $1 ORDER BY step_index");
    let steps: Vec<AgentStep> = client
        .query(&sql, &[&run_id])
        .map_err(|e| format!("Loading steps failed: {e}"))?
        .iter()
        .map(step_from_row)
        .collect::<Result<_, _>>()
        .map_err(|e| e.to_string())?;

    let metrics = StepMetrics::from_steps(&agent_run, &steps);
    if matches!(format, OutputFormat::Json) {
        print_json(&json!({ "run": agent_run, "steps": steps, "metrics": metrics }));
        return Ok(());
    }

    println!(
        "Run {} ({}): {}",
        agent_run.id,
        agent_run.status,
        agent_run.input_query.as_deref().unwrap_or("")
    );
    let rows: Vec<Vec<String>> = steps
        .iter()
        .map(|s| {
            vec![
                s.step_index.to_string(),
                s.step_type.to_string(),
                cell(s.tool_name.as_deref()),
                cell(s.latency_ms),
                cell(s.confidence.map(|c| format!("{c:.3}"))),
            ]
        })
        .collect();
    print_rows(&["#", "type", "tool", "latency_ms", "confidence"], &rows, format);
    print_metrics(&metrics, format)
}
