//! # Audit Subcommand
//!
//! Prints the registry/log reconciliation report. The process exits
//! non-zero when any mismatch exists so the audit can run from cron and
//! page someone.

use anyhow::Result;

use aseo_occupancy::run_audit;
use aseo_store::{FacilityRegistry, UsageLog};

/// Returns whether the store was consistent.
pub async fn run<S>(store: &S) -> Result<bool>
where
    S: FacilityRegistry + UsageLog + Sync,
{
    let findings = run_audit(store).await?;
    if findings.is_empty() {
        println!("registry and usage log are consistent");
        return Ok(true);
    }

    println!("{} mismatch(es) need reconciliation:", findings.len());
    for finding in &findings {
        println!("  - {finding}");
    }
    Ok(false)
}
