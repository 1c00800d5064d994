//! # aseo CLI entry point
//!
//! Parses command-line arguments, sets up tracing from the `-v` count, and
//! dispatches to subcommand handlers on a current-thread runtime; every
//! session is single-threaded cooperative, matching how the store is used.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use aseo_cli::entry::EntryArgs;
use aseo_cli::exit::ExitArgs;
use aseo_cli::history::HistoryArgs;
use aseo_cli::import::ImportArgs;
use aseo_cli::status::StatusArgs;
use aseo_cli::{audit, connect, entry, exit, history, import, stats, status, watch};

/// Restroom occupancy tracking for the school floor.
///
/// Reads and writes the shared PostgreSQL store named by `DATABASE_URL`.
#[derive(Parser, Debug)]
#[command(name = "aseo", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the occupancy board once: counters, group summaries, facilities.
    Status(StatusArgs),

    /// Register a student entering a free facility.
    Entry(EntryArgs),

    /// Register a student leaving an occupied facility.
    Exit(ExitArgs),

    /// List today's completed cycles, optionally filtered.
    History(HistoryArgs),

    /// Bulk-import roster rows from a name,course file.
    Import(ImportArgs),

    /// Follow the occupancy board live until Ctrl-C.
    Watch,

    /// Reconcile registry state against open usage records.
    Audit,

    /// Show lifetime totals (usages, students, courses).
    Stats,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity level.
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("cannot start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli.command)) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> anyhow::Result<ExitCode> {
    let store = connect().await?;
    match command {
        Commands::Status(args) => status::run(&store, args).await?,
        Commands::Entry(args) => entry::run(&store, args).await?,
        Commands::Exit(args) => exit::run(&store, args).await?,
        Commands::History(args) => history::run(&store, args).await?,
        Commands::Import(args) => import::run(&store, args).await?,
        Commands::Watch => watch::run(store).await?,
        Commands::Audit => {
            if !audit::run(&store).await? {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Stats => stats::run(&store).await?,
    }
    Ok(ExitCode::SUCCESS)
}
