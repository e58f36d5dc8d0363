//! TrafficFlow CLI
//!
//! Runs the event pipeline against fixture-backed sources and manages the
//! configuration file.

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::run::RunArgs;

#[derive(Debug, Parser)]
#[command(name = "trafficflow", version, about = "Traffic event detection and dispatch")]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the collector and the live event transport
    Run(RunArgs),

    /// View or modify the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(trafficflow::config::default_config_path);

    let result = match cli.command {
        Command::Run(args) => commands::run::run(&config_path, args),
        Command::Config(command) => commands::config::run(&config_path, command),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
