// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! apiwatch CLI - watch API documentation for changes.
//!
//! # Examples
//!
//! ```bash
//! # One watch cycle over the configured targets file
//! apiwatch
//!
//! # One cycle over a specific targets file, JSON report
//! apiwatch run --targets targets.json --format json --pretty
//!
//! # Keep watching, one cycle per check interval
//! apiwatch run --daemon
//!
//! # Fetch a single URL through the routing layer
//! apiwatch fetch https://docs.example.com/api
//!
//! # Today's proxy usage
//! apiwatch quota
//!
//! # Validate the configuration file
//! apiwatch check-config
//! ```

mod commands;
mod output;
mod setup;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{check_config, fetch, quota, run};

// ============================================================================
// CLI Definition
// ============================================================================

/// apiwatch CLI - API documentation change monitoring.
#[derive(Parser)]
#[command(name = "apiwatch")]
#[command(about = "API documentation change monitoring CLI")]
#[command(long_about = r#"
apiwatch fetches API documentation pages, JSON documents and OpenAPI
specifications, compares them with the last stored revision and reports
meaningful changes.

Pages are fetched directly first; a paid scraping proxy is used as a
fallback when an API key is configured, bounded by a daily quota.

Examples:
  apiwatch                        # One cycle over general.targets_file
  apiwatch run --daemon           # Watch continuously
  apiwatch fetch <url>            # Fetch one URL
  apiwatch quota                  # Proxy usage today
  apiwatch check-config           # Validate the configuration
"#)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run. If none, runs a single watch cycle.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Configuration file (defaults to APIWATCH_CONFIG or the platform path).
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (minimal output).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run a watch cycle (default if no command specified).
    #[command(visible_alias = "r")]
    Run(run::RunArgs),

    /// Fetch one URL through the direct/proxy routing.
    Fetch(fetch::FetchArgs),

    /// Show today's proxy quota and circuit state.
    #[command(visible_alias = "q")]
    Quota,

    /// Validate the configuration file.
    CheckConfig,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[repr(i32)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// General error.
    Error = 1,
    /// Configuration could not be loaded.
    ConfigError = 2,
}

// ============================================================================
// Logging Setup
// ============================================================================

/// Builds the log filter: `-v` wins, then `RUST_LOG`, then the configured level.
fn log_filter(verbose: bool, level: &str) -> EnvFilter {
    if verbose {
        return EnvFilter::new("warn,apiwatch=debug");
    }
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,apiwatch={}", level.to_ascii_lowercase())))
}

fn setup_logging(verbose: bool, quiet: bool, level: &str) {
    if quiet {
        return;
    }

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(log_filter(verbose, level))
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match setup::load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {e:#}");
            }
            std::process::exit(ExitCode::ConfigError as i32);
        }
    };

    setup_logging(cli.verbose, cli.quiet, &config.general.log_level);

    let result = match &cli.command {
        Some(Commands::Run(args)) => run::run(args, &cli, &config).await,
        Some(Commands::Fetch(args)) => fetch::run(args, &cli, &config).await,
        Some(Commands::Quota) => quota::run(&cli, &config).await,
        Some(Commands::CheckConfig) => check_config::run(&cli, &config),
        None => run::run(&run::RunArgs::default(), &cli, &config).await,
    };

    if let Err(e) = result {
        if !cli.quiet {
            eprintln!("Error: {e:#}");
        }
        std::process::exit(ExitCode::Error as i32);
    }

    std::process::exit(ExitCode::Success as i32);
}
