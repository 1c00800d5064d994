//! # Entry Subcommand
//!
//! Registers a student into a free facility. Mirrors the entry form: the
//! course must be one of the imported courses (when any exist), and the
//! facility is addressed by id as shown by `aseo status`.

use anyhow::{bail, Result};
use chrono::Utc;
use clap::Args;

use aseo_core::FacilityId;
use aseo_occupancy::protocol::{register_entry, EntryRequest};
use aseo_store::{FacilityRegistry, Roster, UsageLog};

#[derive(Args, Debug)]
pub struct EntryArgs {
    /// Facility id, as listed by `aseo status`.
    #[arg(long)]
    pub facility: FacilityId,

    /// Student's full name.
    #[arg(long)]
    pub name: String,

    /// Student's course, e.g. "1ESO A".
    #[arg(long)]
    pub course: String,

    /// Optional entry note.
    #[arg(long)]
    pub note: Option<String>,
}

pub async fn run<S>(store: &S, args: EntryArgs) -> Result<()>
where
    S: FacilityRegistry + UsageLog + Roster + Sync,
{
    // Form-side check, same as the entry form's course selector: free text
    // is only accepted while no courses have been imported yet.
    let courses = store.list_courses().await?;
    if !courses.is_empty() && !courses.iter().any(|c| c.name == args.course) {
        let known: Vec<&str> = courses.iter().map(|c| c.name.as_str()).collect();
        bail!(
            "unknown course '{}'; known courses: {}",
            args.course,
            known.join(", ")
        );
    }

    let record = register_entry(
        store,
        EntryRequest {
            facility: args.facility,
            student_name: args.name,
            student_group: args.course,
            note: args.note,
        },
        Utc::now(),
    )
    .await?;

    println!("entry registered, usage record {record}");
    Ok(())
}
