//! # aseo-store — Persistence Seams
//!
//! The occupancy workflows in `aseo-occupancy` are written against three
//! small traits rather than a concrete database:
//!
//! - [`FacilityRegistry`]: the facility rows and their conditional state
//!   writes. `set_occupied` is a single-row conditional update and the only
//!   concurrency-control primitive in the system: the loser of a race gets
//!   [`RegistryError::Conflict`] back instead of overwriting.
//! - [`UsageLog`]: append-mostly entry/exit cycle records and the
//!   aggregate queries behind the dashboard and history views.
//! - [`Roster`]: read-only courses plus the bulk student import.
//! - [`ChangeFeed`]: best-effort live change streams, see [`feed`].
//!
//! Two implementations ship here: [`PgStore`] (PostgreSQL over sqlx, change
//! feed via LISTEN/NOTIFY, embedded migrations) and [`MemoryStore`]
//! (DashMap + broadcast channels) for tests and embedded use.
//!
//! Trait methods return `impl Future + Send` rather than using `async fn`
//! so that generic consumers can hold the futures across `tokio::spawn`.

use std::future::Future;

use chrono::{DateTime, Utc};

use aseo_core::{
    CompletedUsage, Course, ExitCondition, Facility, FacilityId, NewStudent, Occupant,
    OccupancyState, RecordId, UsageRecord,
};

pub mod error;
pub mod feed;
mod memory;
mod postgres;

pub use error::{LogError, RegistryError, StoreError};
pub use feed::{ChangeKind, FacilityChange, Subscription, UsageInsert};
pub use memory::MemoryStore;
pub use postgres::PgStore;

/// The facility registry: a fixed set of rows provisioned out-of-band,
/// mutated only through the two state writes below.
pub trait FacilityRegistry {
    /// All facilities, ordered by name.
    fn list(&self) -> impl Future<Output = Result<Vec<Facility>, StoreError>> + Send;

    /// Facilities currently in `state`, ordered by name.
    fn list_by_state(
        &self,
        state: OccupancyState,
    ) -> impl Future<Output = Result<Vec<Facility>, StoreError>> + Send;

    /// A single facility by id.
    fn get(
        &self,
        id: FacilityId,
    ) -> impl Future<Output = Result<Option<Facility>, StoreError>> + Send;

    /// Move a facility from free to occupied. Conditional on the row being
    /// free at write time; a lost race yields [`RegistryError::Conflict`]
    /// and leaves the row untouched.
    fn set_occupied(
        &self,
        id: FacilityId,
        occupant: Occupant,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), RegistryError>> + Send;

    /// Move a facility to free, clearing the occupant fields. Succeeds for
    /// any existing id regardless of prior state; callers must have already
    /// verified there was an open cycle to close.
    fn set_free(
        &self,
        id: FacilityId,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), RegistryError>> + Send;
}

/// The usage log: one record per entry/exit cycle.
pub trait UsageLog {
    /// Append an open record for a new cycle and return its id.
    fn open_record(
        &self,
        facility_id: FacilityId,
        student_name: &str,
        student_group: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<RecordId, StoreError>> + Send;

    /// The open record for a facility, if any. Finding more than one is an
    /// internal-consistency fault surfaced as [`LogError::MultipleOpen`].
    fn find_open_record(
        &self,
        facility_id: FacilityId,
    ) -> impl Future<Output = Result<Option<UsageRecord>, LogError>> + Send;

    /// Close an open record. Conditional on the record still being open.
    fn close_record(
        &self,
        id: RecordId,
        condition: ExitCondition,
        note: Option<&str>,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), LogError>> + Send;

    /// Every open record, across all facilities. Used by the audit.
    fn open_records(&self) -> impl Future<Output = Result<Vec<UsageRecord>, StoreError>> + Send;

    /// Completed cycles entered after `since`, joined with the facility
    /// name, newest exit first.
    fn completed_today(
        &self,
        since: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<CompletedUsage>, StoreError>> + Send;

    /// Authoritative count of cycles opened at or after `since`.
    fn count_opened_since(
        &self,
        since: DateTime<Utc>,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Total usage records ever written.
    fn count_records(&self) -> impl Future<Output = Result<u64, StoreError>> + Send;
}

/// Roster reference data: courses to choose from and bulk-imported students.
pub trait Roster {
    /// All courses, ordered by name.
    fn list_courses(&self) -> impl Future<Output = Result<Vec<Course>, StoreError>> + Send;

    /// Bulk-insert roster rows; returns how many were written. Duplicates
    /// are permitted.
    fn insert_students(
        &self,
        students: &[NewStudent],
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    fn count_students(&self) -> impl Future<Output = Result<u64, StoreError>> + Send;

    fn count_courses(&self) -> impl Future<Output = Result<u64, StoreError>> + Send;
}

/// Live change notification, one subscription per stream.
pub trait ChangeFeed {
    /// Facility inserts and updates, full-row payloads.
    fn subscribe_facilities(
        &self,
    ) -> impl Future<Output = Result<Subscription<FacilityChange>, StoreError>> + Send;

    /// Usage-record inserts.
    fn subscribe_usage_inserts(
        &self,
    ) -> impl Future<Output = Result<Subscription<UsageInsert>, StoreError>> + Send;
}
