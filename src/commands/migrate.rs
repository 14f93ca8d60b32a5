use postgres::Client;

use agentlens::store::pg::SCHEMA;

pub fn run(client: &mut Client) -> Result<(), String> {
    client
        .batch_execute(SCHEMA)
        .map_err(|e| format!("Migration failed: {e}"))?;
    println!("Schema is up to date");
    Ok(())
}
