mod app;
mod config;
mod effects;
mod render;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use research_logging::research_info;

use crate::config::{AppConfig, Overrides};

/// Follow multi-phase research sessions from the terminal.
#[derive(Parser, Debug)]
#[command(name = "research", version)]
struct Cli {
    /// Backend base URL, e.g. http://127.0.0.1:5001
    #[arg(long, global = true)]
    server: Option<String>,
    /// RON config file; ./research.ron is used when present
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log destination: off, file, terminal or both
    #[arg(long, global = true)]
    log: Option<String>,
    /// Reconnect attempts after the progress stream drops
    #[arg(long, global = true)]
    reconnects: Option<u32>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Research one query and print the report
    Ask {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Interactive session with history and feedback
    Shell,
    /// Show the latest progress of a backend session
    Status { session_id: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("research: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = AppConfig::load(cli.config.as_deref())?.with_overrides(Overrides {
        server: cli.server,
        log: cli.log,
        reconnects: cli.reconnects,
    })?;
    research_logging::initialize(config.log_destination()?, config.log_level()?, &config.log_file);
    match &config.source {
        Some(path) => research_info!("Loaded configuration from {:?}", path),
        None => research_info!("Using built-in configuration defaults"),
    }
    research_info!("Using research backend at {}", config.server_url);

    match cli.command {
        Command::Ask { query } => app::run_ask(&config, &query.join(" ")),
        Command::Shell => app::run_shell(&config),
        Command::Status { session_id } => app::run_status(&config, &session_id),
    }
}
