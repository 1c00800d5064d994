//! # aseo-cli — Command-Line Client
//!
//! Provides the `aseo` binary: the floor-staff view of the occupancy
//! tracker. One module per subcommand:
//!
//! - `aseo status`: one-shot occupancy board with group summaries.
//! - `aseo entry` / `aseo exit`: register a cycle's two transitions.
//! - `aseo history`: today's completed cycles, filterable.
//! - `aseo import`: bulk roster import from a `name,course` file.
//! - `aseo watch`: live board following the change feed.
//! - `aseo audit`: registry/log reconciliation report.
//! - `aseo stats`: lifetime totals.
//!
//! Command handlers are generic over the store traits so they run against
//! the in-memory store in tests exactly as they run against PostgreSQL.

use anyhow::Context;

use aseo_store::PgStore;

pub mod audit;
pub mod entry;
pub mod exit;
pub mod history;
pub mod import;
pub mod render;
pub mod stats;
pub mod status;
pub mod watch;

/// Connect to the shared store named by `DATABASE_URL`.
///
/// The CLI refuses to run without it: an in-memory session would silently
/// discard every registration at process exit.
pub async fn connect() -> anyhow::Result<PgStore> {
    let url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL is not set; aseo needs the shared PostgreSQL store")?;
    Ok(PgStore::connect(&url).await?)
}
