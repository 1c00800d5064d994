//! # Status Subcommand
//!
//! One-shot occupancy board: fetches the registry and today's usage count,
//! renders, and exits. `--free` narrows the list to facilities a student can
//! enter right now; `--occupied` to the ones someone can leave. For a
//! continuously updating board see `watch`.

use anyhow::Result;
use chrono::Utc;
use clap::Args;

use aseo_core::{start_of_local_day, OccupancyState};
use aseo_store::{FacilityRegistry, UsageLog};

use crate::render::render_board;

#[derive(Args, Debug, Default)]
pub struct StatusArgs {
    /// Show only free facilities.
    #[arg(long, conflicts_with = "occupied")]
    pub free: bool,

    /// Show only occupied facilities.
    #[arg(long, conflicts_with = "free")]
    pub occupied: bool,
}

pub async fn run<S>(store: &S, args: StatusArgs) -> Result<()>
where
    S: FacilityRegistry + UsageLog + Sync,
{
    let facilities = if args.free {
        store.list_by_state(OccupancyState::Free).await?
    } else if args.occupied {
        store.list_by_state(OccupancyState::Occupied).await?
    } else {
        store.list().await?
    };
    let usage_today = store
        .count_opened_since(start_of_local_day(Utc::now()))
        .await?;
    print!("{}", render_board(&facilities, usage_today));
    Ok(())
}
