//! # History Subcommand
//!
//! Today's completed cycles, newest exit first, filterable by facility and
//! exit condition. Filters are AND-combined and applied to the locally
//! fetched list; omitting a flag leaves that dimension wide open.

use anyhow::Result;
use chrono::{Local, Utc};
use clap::Args;

use aseo_core::{filter_history, start_of_local_day, FacilityId, HistoryFilter};
use aseo_store::{FacilityRegistry, UsageLog};

use crate::exit::ConditionArg;

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Only cycles in this facility.
    #[arg(long)]
    pub facility: Option<FacilityId>,

    /// Only cycles closed with this condition.
    #[arg(long, value_enum)]
    pub condition: Option<ConditionArg>,
}

pub async fn run<S>(store: &S, args: HistoryArgs) -> Result<()>
where
    S: FacilityRegistry + UsageLog + Sync,
{
    let completed = store
        .completed_today(start_of_local_day(Utc::now()))
        .await?;
    let filter = HistoryFilter {
        facility: args.facility,
        condition: args.condition.map(Into::into),
    };
    let hits = filter_history(&completed, &filter);

    if hits.is_empty() {
        println!("no completed cycles match");
        return Ok(());
    }

    for usage in hits {
        let record = &usage.record;
        let exit_time = record
            .exit_time
            .map(|t| t.with_timezone(&Local).format("%H:%M").to_string())
            .unwrap_or_else(|| "--:--".to_string());
        let condition = record
            .exit_condition
            .map(|c| c.to_string())
            .unwrap_or_else(|| "?".to_string());
        let note = record
            .exit_note
            .as_deref()
            .map(|note| format!(" \"{note}\""))
            .unwrap_or_default();
        println!(
            "{exit_time}  {} ({})  {}  {condition}{note}",
            record.student_name, record.student_group, usage.facility_name
        );
    }
    Ok(())
}
