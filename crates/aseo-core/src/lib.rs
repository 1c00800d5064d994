//! # aseo-core — Domain Model for Restroom Occupancy Tracking
//!
//! Foundational types shared by every other crate in the workspace:
//!
//! - **Identifiers** ([`identity`]): uuid-backed newtypes. A [`FacilityId`]
//!   cannot be passed where a [`RecordId`] is expected.
//! - **Facilities** ([`facility`]): the registry entity. Occupancy is an
//!   enum, so "occupant fields set iff occupied" is enforced by construction
//!   rather than by convention over nullable columns.
//! - **Usage records** ([`usage`]): one row per entry/exit cycle; an open
//!   cycle is a record whose `exit_time` is `None`.
//! - **Roster** ([`roster`]): courses, students, and the bulk-import line
//!   parser.
//! - **Queries** ([`query`]): pure derivations over already-fetched data:
//!   group occupancy summaries, history filtering, and the local-midnight
//!   "today" boundary.
//!
//! This crate performs no I/O and holds no async machinery; persistence
//! seams live in `aseo-store` and workflows in `aseo-occupancy`.

pub mod facility;
pub mod identity;
pub mod query;
pub mod roster;
pub mod usage;

pub use facility::{Facility, Occupancy, OccupancyState, Occupant};
pub use identity::{CourseId, FacilityId, RecordId};
pub use query::{filter_history, group_summary, start_of_local_day, GroupSummary, HistoryFilter};
pub use roster::{parse_roster, Course, NewStudent, RosterImport};
pub use usage::{CompletedUsage, ExitCondition, UsageRecord};
