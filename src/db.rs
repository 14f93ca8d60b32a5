use postgres::{Client, NoTls};

use agentlens::config::Profile;

/// Connect to Postgres. `db_override` (from --db flag) takes highest priority,
/// then the profile's connection string.
pub fn connect(profile: &Profile, db_override: Option<&str>) -> Result<Client, String> {
    let conn_str = db_override
        .or(profile.connection.as_deref())
        .ok_or("No connection string. Use --db or set one in .agentlens/config.toml")?;

    Client::connect(conn_str, NoTls).map_err(|e| format!("Connection failed: {e}"))
}
