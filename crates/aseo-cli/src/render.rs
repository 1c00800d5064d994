//! Text rendering for the occupancy board, shared by `status` and `watch`.

use std::fmt::Write as _;

use chrono::Local;

use aseo_core::{group_summary, Facility};

/// The two group labels the dashboard summarizes, matched against facility
/// names by case-insensitive containment.
pub const GROUP_LABELS: [&str; 2] = ["chicas", "chicos"];

/// One line per facility: name, state, and occupant details when occupied.
pub fn facility_line(facility: &Facility) -> String {
    match facility.occupancy.occupant() {
        Some(occupant) => {
            let since = facility
                .last_change
                .with_timezone(&Local)
                .format("%H:%M");
            let note = occupant
                .entry_note
                .as_deref()
                .map(|note| format!(" \"{note}\""))
                .unwrap_or_default();
            format!(
                "{:<24} occupied  {} ({}) since {since}{note}",
                facility.name, occupant.occupant_name, occupant.occupant_group
            )
        }
        None => format!("{:<24} free", facility.name),
    }
}

/// The full board: today's counter, the group summaries, then the facilities.
pub fn render_board(facilities: &[Facility], usage_today: u64) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Usos hoy: {usage_today}");
    for label in GROUP_LABELS {
        let summary = group_summary(facilities, label);
        let _ = writeln!(out, "{label}: {}/{} occupied", summary.occupied, summary.total);
    }
    let _ = writeln!(out);
    if facilities.is_empty() {
        let _ = writeln!(out, "no facilities configured");
    }
    for facility in facilities {
        let _ = writeln!(out, "{}", facility_line(facility));
    }
    out
}
