mod commands;
mod db;
mod output;

use clap::{Parser, Subcommand};
use output::OutputFormat;

use agentlens::config;
use agentlens::serve;

#[derive(Parser)]
#[command(name = "agentlens", version, about = "Agent observability demo backend")]
struct Cli {
    /// Postgres connection string (overrides config)
    #[arg(long, global = true)]
    db: Option<String>,

    /// Config profile to use
    #[arg(long, global = true, default_value = "default")]
    profile: String,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "table")]
    format: OutputFormat,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Run the HTTP API
    Serve {
        /// Address to listen on (e.g. 0.0.0.0:8080)
        #[arg(long)]
        listen: Option<String>,

        /// Directory of a built front end to serve as a fallback
        #[arg(long)]
        static_dir: Option<String>,

        /// Keep all data in process memory instead of Postgres
        #[arg(long)]
        in_memory: bool,
    },

    /// Create the tables if they do not exist
    Migrate,

    /// Test the connection and show table sizes
    Ping,

    /// Demo sessions
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },

    /// Agent runs
    Runs {
        #[command(subcommand)]
        action: RunsAction,
    },
}

#[derive(Subcommand)]
enum SessionsAction {
    /// List demo sessions, newest first
    List,

    /// Delete expired sessions together with their runs and steps
    Prune,
}

#[derive(Subcommand)]
enum RunsAction {
    /// List the runs of a session with dashboard metrics
    List {
        /// Demo session id
        session: String,
    },

    /// Show the step trace of a run
    Show {
        /// Run id
        run: String,
    },
}

fn serve(
    cli_db: Option<&str>,
    profile_name: &str,
    listen: Option<String>,
    static_dir: Option<String>,
    in_memory: bool,
) -> Result<(), String> {
    let mut profile = config::load_config(profile_name);
    if let Some(db) = cli_db {
        profile.connection = Some(db.to_string());
    }
    if listen.is_some() {
        profile.listen = listen;
    }
    if static_dir.is_some() {
        profile.static_dir = static_dir;
    }

    let config = serve::config::Config::from_profile(&profile, in_memory)?;
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| format!("Failed to start runtime: {e}"))?;
    runtime.block_on(serve::run(config))
}

fn main() {
    let cli = Cli::parse();

    let command = match cli.command {
        CliCommand::Serve {
            listen,
            static_dir,
            in_memory,
        } => {
            if let Err(e) = serve(cli.db.as_deref(), &cli.profile, listen, static_dir, in_memory) {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
            return;
        }
        CliCommand::Migrate => commands::Command::Migrate,
        CliCommand::Ping => commands::Command::Ping,
        CliCommand::Sessions { action } => match action {
            SessionsAction::List => commands::Command::SessionList,
            SessionsAction::Prune => commands::Command::SessionPrune,
        },
        CliCommand::Runs { action } => match action {
            RunsAction::List { session } => commands::Command::RunList { session },
            RunsAction::Show { run } => commands::Command::RunShow { run },
        },
    };

    if let Err(e) = commands::run(command, &cli.profile, cli.db.as_deref(), &cli.format) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
