//! CLI entry and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use lighthouse_core::config;

mod commands;

#[derive(Parser)]
#[command(name = "lighthouse")]
#[command(version)]
#[command(about = "Popup launcher that shows results from a query command")]
#[command(
    long_about = "Type a query, pick a result, get its action on stdout.\n\n\
                  Every keystroke sends the whole query as one line to the child command. \
                  The child answers each query with one line of {text|action|description} records."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Child command line (run through `sh -c`)
    #[arg(long, env = "LIGHTHOUSE_CMD", value_name = "COMMAND")]
    cmd: Option<String>,

    /// Read configuration from this file instead of $LIGHTHOUSE_HOME/config.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Popup width in columns
    #[arg(long)]
    width: Option<u16>,

    /// Maximum number of result rows
    #[arg(long, value_name = "N")]
    max_results: Option<u16>,

    /// Write logs to this file
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

/// Parses arguments and runs. Returns the process exit code.
pub fn run() -> Result<i32> {
    let cli = Cli::parse();

    if let Some(Commands::Config { command }) = &cli.command {
        match command {
            ConfigCommands::Path => commands::config::path(),
            ConfigCommands::Init => commands::config::init()?,
        }
        return Ok(0);
    }

    let mut config = match cli.config.as_deref() {
        Some(path) => config::Config::load_from(path),
        None => config::Config::load(),
    }
    .context("load config")?;

    if let Some(cmd) = cli.cmd {
        config.cmd = cmd;
    }
    if let Some(width) = cli.width {
        config.width = width;
    }
    if let Some(max_results) = cli.max_results {
        config.max_results = max_results;
    }
    if let Some(log_file) = cli.log_file {
        config.log_file = Some(log_file);
    }

    commands::popup::run(&config)
}
