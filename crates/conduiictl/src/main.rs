//! Conduii Control - CLI front end for the Conduii engine
//!
//! Discovers services in a project, runs the resulting tests and reports
//! health and diagnostics as terminal text or JSON.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use conduii_core::TestType;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "conduiictl")]
#[command(about = "Conduii - service discovery and integration testing", long_about = None)]
#[command(version)]
#[command(disable_help_subcommand = true)]
struct Cli {
    /// Config file (default: conduii.toml / conduii.json in the project dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Project directory
    #[arg(long, global = true, default_value = ".")]
    dir: PathBuf,

    /// Environment to test against (overrides the config file)
    #[arg(long, global = true)]
    env: Option<String>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the project for services and API routes
    Discover {
        /// Output JSON only
        #[arg(long)]
        json: bool,
    },

    /// Run registered and discovered tests
    Run {
        /// Only run tests of this type
        #[arg(long = "type", value_name = "TYPE")]
        test_type: Option<TestType>,

        /// Only run tests carrying this tag (repeatable)
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,

        /// Run tests one at a time
        #[arg(long)]
        serial: bool,

        /// Maximum number of tests in flight
        #[arg(long, value_name = "N")]
        concurrency: Option<usize>,

        /// Skip remaining tests after the first failure
        #[arg(long)]
        stop_on_failure: bool,

        /// Output JSON only
        #[arg(long)]
        json: bool,
    },

    /// Check the health of every configured adapter
    Health {
        /// Output JSON only
        #[arg(long)]
        json: bool,
    },

    /// Run everything and explain the failures
    Diagnose {
        /// Output JSON only
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    // stderr keeps --json output on stdout parseable
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let raw = commands::load_raw_config(cli.config.as_deref(), &cli.dir, cli.env)?;
    init_logging(cli.verbose || raw.verbose.unwrap_or(false));
    let config = commands::validate(raw)?;

    let exit_code = match cli.command {
        Commands::Discover { json } => commands::discover(config, json).await?,
        Commands::Run {
            test_type,
            tags,
            serial,
            concurrency,
            stop_on_failure,
            json,
        } => {
            let options = commands::RunArgs {
                test_type,
                tags,
                serial,
                concurrency,
                stop_on_failure,
            };
            commands::run(config, options, json).await?
        }
        Commands::Health { json } => commands::health(config, json).await?,
        Commands::Diagnose { json } => commands::diagnose(config, json).await?,
    };

    std::process::exit(exit_code);
}
