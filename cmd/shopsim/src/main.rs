//! Shopsim CLI - instrumented storefront workflows on a simulated backend.
//!
//! Commands:
//! - `shopsim init` - Write a default settings file
//! - `shopsim run` - Run one workflow and print its span trees
//! - `shopsim campaign` - Decision statistics for one endpoint
//! - `shopsim soak` - Concurrent checkout sessions with tree checks

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::run::Flow;
use commands::Overrides;

#[derive(Parser)]
#[command(name = "shopsim")]
#[command(about = "Instrumented storefront workflows on a deterministic simulated backend")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit log lines as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Path to the settings file
    #[arg(short, long, global = true, env = "SHOPSIM_SETTINGS", default_value = "shopsim.yaml")]
    settings: String,

    /// Seed for all simulated randomness
    #[arg(long, global = true, env = "SHOPSIM_SEED", default_value_t = 42)]
    seed: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default settings file
    Init {
        /// Output path
        #[arg(default_value = "shopsim.yaml")]
        path: String,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Run one workflow and print the exported span trees
    Run {
        /// Workflow to run
        #[arg(short, long, value_enum, default_value = "checkout")]
        flow: Flow,

        /// Append traces to this JSON lines file instead of printing them
        #[arg(short, long, conflicts_with = "log")]
        out: Option<String>,

        /// Emit traces as log events instead of printing them
        #[arg(long)]
        log: bool,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Run decisions for one endpoint without waiting and summarize them
    Campaign {
        /// Endpoint to exercise
        #[arg(short, long)]
        endpoint: String,

        /// Number of decisions
        #[arg(short = 'n', long, default_value_t = 10_000)]
        iterations: usize,

        /// Write per-outcome rows to this CSV file
        #[arg(long)]
        csv: Option<String>,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Run concurrent checkout sessions and check every exported tree
    Soak {
        /// Number of sessions
        #[arg(short = 'n', long, default_value_t = 50)]
        sessions: usize,

        /// Cancel sessions still running after this many milliseconds
        #[arg(long)]
        cancel_after_ms: Option<u64>,

        #[command(flatten)]
        overrides: Overrides,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));
    if cli.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    match cli.command {
        Commands::Init { path, force } => commands::init::run(&path, force),
        Commands::Run {
            flow,
            out,
            log,
            overrides,
        } => {
            let settings = commands::load_settings(&cli.settings, &overrides)?;
            let sink = match (out, log) {
                (Some(path), _) => commands::run::Sink::JsonLines(path),
                (None, true) => commands::run::Sink::Log,
                (None, false) => commands::run::Sink::Stdout,
            };
            commands::run::run(settings, cli.seed, flow, sink).await
        }
        Commands::Campaign {
            endpoint,
            iterations,
            csv,
            overrides,
        } => {
            let settings = commands::load_settings(&cli.settings, &overrides)?;
            commands::campaign::run(&settings, cli.seed, &endpoint, iterations, csv.as_deref())
        }
        Commands::Soak {
            sessions,
            cancel_after_ms,
            overrides,
        } => {
            let settings = commands::load_settings(&cli.settings, &overrides)?;
            commands::soak::run(settings, cli.seed, sessions, cancel_after_ms).await
        }
    }
}
