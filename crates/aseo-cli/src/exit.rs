//! # Exit Subcommand
//!
//! Closes a facility's open cycle: the student reports the condition the
//! facility was left in, optionally with an incident note.

use anyhow::Result;
use chrono::Utc;
use clap::{Args, ValueEnum};

use aseo_core::{ExitCondition, FacilityId};
use aseo_occupancy::protocol::{register_exit, ExitRequest};
use aseo_store::{FacilityRegistry, UsageLog};

/// Condition choices as exposed on the command line.
#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum ConditionArg {
    Good,
    Fair,
    Poor,
}

impl From<ConditionArg> for ExitCondition {
    fn from(arg: ConditionArg) -> Self {
        match arg {
            ConditionArg::Good => Self::Good,
            ConditionArg::Fair => Self::Fair,
            ConditionArg::Poor => Self::Poor,
        }
    }
}

#[derive(Args, Debug)]
pub struct ExitArgs {
    /// Facility id, as listed by `aseo status`.
    #[arg(long)]
    pub facility: FacilityId,

    /// Condition the facility was left in.
    #[arg(long, value_enum)]
    pub condition: ConditionArg,

    /// Optional incident note (missing paper, dirt, ...).
    #[arg(long)]
    pub note: Option<String>,
}

pub async fn run<S>(store: &S, args: ExitArgs) -> Result<()>
where
    S: FacilityRegistry + UsageLog + Sync,
{
    register_exit(
        store,
        ExitRequest {
            facility: args.facility,
            condition: args.condition.into(),
            note: args.note,
        },
        Utc::now(),
    )
    .await?;

    println!("exit registered, facility {} is free", args.facility);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aseo_core::OccupancyState;
    use aseo_occupancy::protocol::{register_entry, EntryRequest};
    use aseo_store::MemoryStore;

    #[tokio::test]
    async fn closes_an_open_cycle() {
        let store = MemoryStore::new();
        let facility = store.seed_facility("Aseo Chicas 1", Utc::now());
        register_entry(
            &store,
            EntryRequest {
                facility,
                student_name: "Ana".into(),
                student_group: "1ESO A".into(),
                note: None,
            },
            Utc::now(),
        )
        .await
        .unwrap();

        run(
            &store,
            ExitArgs {
                facility,
                condition: ConditionArg::Good,
                note: None,
            },
        )
        .await
        .unwrap();

        let row = store.get(facility).await.unwrap().unwrap();
        assert_eq!(row.state(), OccupancyState::Free);
    }

    #[tokio::test]
    async fn surfaces_the_missing_cycle_error() {
        let store = MemoryStore::new();
        let facility = store.seed_facility("Aseo Chicas 1", Utc::now());
        let err = run(
            &store,
            ExitArgs {
                facility,
                condition: ConditionArg::Poor,
                note: None,
            },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("no open usage record"));
    }
}
