//! pagecheck CLI - Main Entry Point
//!
//! Runs declarative UI assertion suites against a browser reached over
//! WebDriver.
//!
//! Exit codes: 0 when every test passed, 1 on test failures, 2 when the run
//! could not complete (bad config, unreadable suites, lost session).

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use pagecheck_common::{Config, DEFAULT_CONFIG_FILE};

mod commands;
mod output;

use commands::{list, run};

/// pagecheck - declarative UI assertion runner
#[derive(Parser)]
#[command(name = "pagecheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all suites, or one with --suite
    Run(run::RunArgs),

    /// List declared suites
    List(list::ListArgs),

    /// Write a configuration file with default settings
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    match execute(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            std::process::exit(2);
        }
    }
}

async fn execute(cli: Cli) -> Result<bool> {
    if let Commands::Init { force } = cli.command {
        if cli.config.exists() && !force {
            bail!("{} already exists (use --force to overwrite)", cli.config.display());
        }
        Config::default().save(&cli.config)?;
        output::print_success(&format!("Wrote {}", cli.config.display()));
        return Ok(true);
    }

    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    match cli.command {
        Commands::Run(args) => run::execute(args, config, cli.format).await,
        Commands::List(args) => list::execute(args, &config, cli.format).map(|_| true),
        Commands::Init { .. } => Ok(true),
    }
}
