use postgres::Client;

use crate::output::{print_rows, OutputFormat};

const TABLES: [&str; 3] = ["demo_sessions", "agent_runs", "agent_steps"];

pub fn run(client: &mut Client, format: &OutputFormat) -> Result<(), String> {
    // Basic connectivity check
    let row = client
        .query_one("SELECT current_database()", &[])
        .map_err(|e| format!("Ping failed: {e}"))?;
    let database: String = row.get(0);
    println!("Connected to {database}");

    let mut rows = Vec::with_capacity(TABLES.len());
    for table in TABLES {
        let count: i64 = client
            .query_one(&format!("SELECT count(*) FROM {table}"), &[])
            .map_err(|e| format!("Table {table} unavailable (run `agentlens migrate`?): {e}"))?
            .get(0);
        rows.push(vec![table.to_string(), count.to_string()]);
    }

    print_rows(&["table", "rows"], &rows, format);
    Ok(())
}
