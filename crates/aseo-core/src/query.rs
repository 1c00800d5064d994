//! # Pure Query/Filter Derivations
//!
//! Read-only computations over already-fetched data. Nothing here touches
//! the store; callers pass in the rows they hold and get derived views back.

use chrono::{DateTime, Local, NaiveTime, TimeZone, Utc};

use crate::facility::Facility;
use crate::identity::FacilityId;
use crate::usage::{CompletedUsage, ExitCondition};

/// Occupancy summary for one group label, e.g. 1 of 2 "chicas" facilities
/// occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GroupSummary {
    pub occupied: usize,
    pub total: usize,
}

/// Count occupied and total facilities whose name contains `label`,
/// case-insensitively. Facilities matching no label simply never show up in
/// any summary.
pub fn group_summary<'a, I>(facilities: I, label: &str) -> GroupSummary
where
    I: IntoIterator<Item = &'a Facility>,
{
    let label = label.to_lowercase();
    let mut summary = GroupSummary::default();
    for facility in facilities {
        if facility.name.to_lowercase().contains(&label) {
            summary.total += 1;
            if !facility.occupancy.is_free() {
                summary.occupied += 1;
            }
        }
    }
    summary
}

/// Filter dimensions for the history view. `None` in a dimension means
/// "all": the filter is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HistoryFilter {
    pub facility: Option<FacilityId>,
    pub condition: Option<ExitCondition>,
}

impl HistoryFilter {
    fn matches(&self, usage: &CompletedUsage) -> bool {
        if let Some(facility) = self.facility {
            if usage.record.facility_id != facility {
                return false;
            }
        }
        if let Some(condition) = self.condition {
            if usage.record.exit_condition != Some(condition) {
                return false;
            }
        }
        true
    }
}

/// Apply an AND-combined [`HistoryFilter`] to a locally cached history list,
/// preserving order.
pub fn filter_history<'a>(
    records: &'a [CompletedUsage],
    filter: &HistoryFilter,
) -> Vec<&'a CompletedUsage> {
    records.iter().filter(|usage| filter.matches(usage)).collect()
}

/// Start of the calendar day containing `now` in the machine's local
/// timezone, expressed in UTC. This is the "today" boundary for the usage
/// counter and the history view.
pub fn start_of_local_day(now: DateTime<Utc>) -> DateTime<Utc> {
    let local_midnight = now.with_timezone(&Local).date_naive().and_time(NaiveTime::MIN);
    Local
        .from_local_datetime(&local_midnight)
        .earliest()
        // Midnight can be skipped by a DST jump; the first valid instant of
        // the day is the boundary then.
        .unwrap_or_else(|| Local.from_utc_datetime(&local_midnight))
        .with_timezone(&Utc)
}
