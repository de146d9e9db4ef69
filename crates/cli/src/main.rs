//! Scriptcheck CLI - Main Entry Point
//!
//! Validates QA test-script documents under one or more paths and exits
//! with 0 (pass), 1 (violations) or 2 (unreadable input or bad invocation).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

mod commands;
mod output;

use output::OutputFormat;

/// Scriptcheck - conformance validator for QA test scripts
#[derive(Parser)]
#[command(name = "scriptcheck")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Files or directories to validate
    #[arg(required_unless_present = "list_rules")]
    paths: Vec<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Treat warnings as failures
    #[arg(long)]
    strict: bool,

    /// Config file (defaults to ./scriptcheck.toml when present)
    #[arg(long, env = "SCRIPTCHECK_CONFIG")]
    config: Option<PathBuf>,

    /// Maximum number of documents checked concurrently
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Print the active rule set and exit
    #[arg(long)]
    list_rules: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging; stdout carries the report only
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<u8> {
    let config = commands::load_config(cli.config.as_deref(), cli.jobs)?;

    if cli.list_rules {
        return commands::rules::execute(config, cli.format);
    }

    commands::check::execute(cli.paths, config, cli.format, cli.strict).await
}
