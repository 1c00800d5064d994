//! # Import Subcommand
//!
//! Bulk roster import from a `name,course` text file, the same export the
//! admin page accepts: header line and malformed lines are skipped, valid
//! rows are inserted as-is (duplicates included).

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use aseo_core::parse_roster;
use aseo_store::Roster;

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Path to the roster file (one `name,course` per line).
    pub file: PathBuf,
}

pub async fn run<S>(store: &S, args: ImportArgs) -> Result<()>
where
    S: Roster + Sync,
{
    let text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("cannot read roster file {}", args.file.display()))?;

    let import = parse_roster(&text);
    if import.students.is_empty() {
        println!("no valid rows found ({} lines skipped)", import.skipped);
        return Ok(());
    }

    let inserted = store.insert_students(&import.students).await?;
    println!("imported {inserted} students ({} lines skipped)", import.skipped);
    Ok(())
}
