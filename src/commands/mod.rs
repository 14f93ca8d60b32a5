pub mod migrate;
pub mod ping;
pub mod runs;
pub mod sessions;

use agentlens::config;

use crate::db;
use crate::output::OutputFormat;

pub enum Command {
    Migrate,
    Ping,
    SessionList,
    SessionPrune,
    RunList { session: String },
    RunShow { run: String },
}

pub fn run(
    command: Command,
    profile_name: &str,
    db_override: Option<&str>,
    format: &OutputFormat,
) -> Result<(), String> {
    let profile = config::load_config(profile_name);
    let mut client = db::connect(&profile, db_override)?;

    match command {
        Command::Migrate => migrate::run(&mut client),
        Command::Ping => ping::run(&mut client, format),
        Command::SessionList => sessions::list(&mut client, format),
        Command::SessionPrune => sessions::prune(&mut client),
        Command::RunList { session } => runs::list(&mut client, &session, format),
        Command::RunShow { run } => runs::show(&mut client, &run, format),
    }
}

/// Parse a UUID argument, naming the argument in the error.
pub fn parse_id(what: &str, raw: &str) -> Result<uuid::Uuid, String> {
    uuid::Uuid::parse_str(raw.trim()).map_err(|e| format!("Invalid {what} id '{raw}': {e}"))
}
