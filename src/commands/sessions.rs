use postgres::Client;

use agentlens::store::pg::{session_from_row, SESSION_COLUMNS};

use crate::output::{cell, print_rows, OutputFormat};

pub fn list(client: &mut Client, format: &OutputFormat) -> Result<(), String> {
    let sql = format!("SELECT {SESSION_COLUMNS} FROM demo_sessions ORDER BY created_at DESC");
    let rows = client
        .query(&sql, &[])
        .map_err(|e| format!("Listing sessions failed: {e}"))?;

    if rows.is_empty() {
        println!("No demo sessions.");
        return Ok(());
    }

    let now = chrono::Utc::now();
    let table: Vec<Vec<String>> = rows
        .iter()
        .map(session_from_row)
        .map(|s| {
            vec![
                s.id.to_string(),
                s.name.clone(),
                s.email.clone(),
                s.company.clone(),
                s.role.clone(),
                s.run_count.to_string(),
                s.expires_at.to_rfc3339(),
                cell(s.is_expired(now).then_some("expired")),
            ]
        })
        .collect();

    print_rows(
        &["id", "name", "email", "company", "role", "runs", "expires_at", "state"],
        &table,
        format,
    );
    Ok(())
}

/// Remove expired sessions; runs and steps go with them via ON DELETE CASCADE.
pub fn prune(client: &mut Client) -> Result<(), String> {
    let deleted = client
        .execute("DELETE FROM demo_sessions WHERE expires_at <= now()", &[])
        .map_err(|e| format!("Pruning sessions failed: {e}"))?;
    println!("Deleted {deleted} expired session(s)");
    Ok(())
}
