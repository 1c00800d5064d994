//! In-memory store backed by DashMap, with broadcast-fanned change events.
//!
//! Used by tests and embedded callers; nothing survives the process. The
//! concurrency contract matches the PostgreSQL store: `set_occupied`
//! validates and writes under a single entry lock, so two concurrent
//! entries on one facility cannot both succeed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};

use aseo_core::{
    CompletedUsage, Course, CourseId, ExitCondition, Facility, FacilityId, NewStudent, Occupancy,
    Occupant, OccupancyState, RecordId, UsageRecord,
};

use crate::error::{LogError, RegistryError, StoreError};
use crate::feed::{ChangeKind, FacilityChange, Subscription, UsageInsert};
use crate::{ChangeFeed, FacilityRegistry, Roster, UsageLog};

const EVENT_BUFFER: usize = 256;

struct Inner {
    facilities: DashMap<FacilityId, Facility>,
    records: DashMap<RecordId, UsageRecord>,
    courses: DashMap<CourseId, Course>,
    students: Mutex<Vec<NewStudent>>,
    facility_tx: broadcast::Sender<FacilityChange>,
    usage_tx: broadcast::Sender<UsageInsert>,
}

/// Shared in-memory store. Cheaply cloneable; all clones see the same data
/// and feed the same change streams.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (facility_tx, _) = broadcast::channel(EVENT_BUFFER);
        let (usage_tx, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            inner: Arc::new(Inner {
                facilities: DashMap::new(),
                records: DashMap::new(),
                courses: DashMap::new(),
                students: Mutex::new(Vec::new()),
                facility_tx,
                usage_tx,
            }),
        }
    }

    /// Provision a free facility, as seed data would. Emits an insert event.
    pub fn seed_facility(&self, name: &str, now: DateTime<Utc>) -> FacilityId {
        let facility = Facility {
            id: FacilityId::new(),
            name: name.to_string(),
            occupancy: Occupancy::Free,
            last_change: now,
        };
        let id = facility.id;
        self.inner.facilities.insert(id, facility.clone());
        let _ = self.inner.facility_tx.send(FacilityChange {
            kind: ChangeKind::Insert,
            facility,
        });
        id
    }

    /// Provision a course, as seed data would.
    pub fn seed_course(&self, name: &str) -> CourseId {
        let course = Course {
            id: CourseId::new(),
            name: name.to_string(),
        };
        let id = course.id;
        self.inner.courses.insert(id, course);
        id
    }

    fn sorted_by_name(mut facilities: Vec<Facility>) -> Vec<Facility> {
        facilities.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.to_string().cmp(&b.id.to_string())));
        facilities
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FacilityRegistry for MemoryStore {
    async fn list(&self) -> Result<Vec<Facility>, StoreError> {
        let facilities = self.inner.facilities.iter().map(|f| f.clone()).collect();
        Ok(Self::sorted_by_name(facilities))
    }

    async fn list_by_state(&self, state: OccupancyState) -> Result<Vec<Facility>, StoreError> {
        let facilities = self
            .inner
            .facilities
            .iter()
            .filter(|f| f.state() == state)
            .map(|f| f.clone())
            .collect();
        Ok(Self::sorted_by_name(facilities))
    }

    async fn get(&self, id: FacilityId) -> Result<Option<Facility>, StoreError> {
        Ok(self.inner.facilities.get(&id).map(|f| f.clone()))
    }

    async fn set_occupied(
        &self,
        id: FacilityId,
        occupant: Occupant,
        now: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        let snapshot = {
            let mut entry = self
                .inner
                .facilities
                .get_mut(&id)
                .ok_or(RegistryError::NotFound { id })?;
            if !entry.occupancy.is_free() {
                return Err(RegistryError::Conflict { id });
            }
            entry.occupancy = Occupancy::Occupied(occupant);
            entry.last_change = now;
            entry.clone()
        };
        let _ = self.inner.facility_tx.send(FacilityChange {
            kind: ChangeKind::Update,
            facility: snapshot,
        });
        Ok(())
    }

    async fn set_free(&self, id: FacilityId, now: DateTime<Utc>) -> Result<(), RegistryError> {
        let snapshot = {
            let mut entry = self
                .inner
                .facilities
                .get_mut(&id)
                .ok_or(RegistryError::NotFound { id })?;
            entry.occupancy = Occupancy::Free;
            entry.last_change = now;
            entry.clone()
        };
        let _ = self.inner.facility_tx.send(FacilityChange {
            kind: ChangeKind::Update,
            facility: snapshot,
        });
        Ok(())
    }
}

impl UsageLog for MemoryStore {
    async fn open_record(
        &self,
        facility_id: FacilityId,
        student_name: &str,
        student_group: &str,
        now: DateTime<Utc>,
    ) -> Result<RecordId, StoreError> {
        let record = UsageRecord {
            id: RecordId::new(),
            student_name: student_name.to_string(),
            student_group: student_group.to_string(),
            facility_id,
            entry_time: now,
            exit_time: None,
            exit_condition: None,
            exit_note: None,
        };
        let id = record.id;
        self.inner.records.insert(id, record.clone());
        let _ = self.inner.usage_tx.send(UsageInsert { record });
        Ok(id)
    }

    async fn find_open_record(
        &self,
        facility_id: FacilityId,
    ) -> Result<Option<UsageRecord>, LogError> {
        let mut open: Vec<UsageRecord> = self
            .inner
            .records
            .iter()
            .filter(|r| r.facility_id == facility_id && r.is_open())
            .map(|r| r.clone())
            .collect();
        match open.len() {
            0 => Ok(None),
            1 => Ok(open.pop()),
            count => Err(LogError::MultipleOpen {
                id: facility_id,
                count,
            }),
        }
    }

    async fn close_record(
        &self,
        id: RecordId,
        condition: ExitCondition,
        note: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), LogError> {
        let mut entry = self
            .inner
            .records
            .get_mut(&id)
            .ok_or(LogError::NotFound { id })?;
        if !entry.is_open() {
            return Err(LogError::NotFound { id });
        }
        entry.exit_time = Some(now);
        entry.exit_condition = Some(condition);
        entry.exit_note = note.map(str::to_string);
        Ok(())
    }

    async fn open_records(&self) -> Result<Vec<UsageRecord>, StoreError> {
        let mut open: Vec<UsageRecord> = self
            .inner
            .records
            .iter()
            .filter(|r| r.is_open())
            .map(|r| r.clone())
            .collect();
        open.sort_by_key(|r| r.entry_time);
        Ok(open)
    }

    async fn completed_today(&self, since: DateTime<Utc>) -> Result<Vec<CompletedUsage>, StoreError> {
        let mut completed: Vec<CompletedUsage> = self
            .inner
            .records
            .iter()
            .filter(|r| r.entry_time > since && !r.is_open())
            .filter_map(|r| {
                // Inner-join semantics: a record whose facility row is gone
                // does not appear, same as the SQL join.
                let facility_name = self
                    .inner
                    .facilities
                    .get(&r.facility_id)
                    .map(|f| f.name.clone())?;
                Some(CompletedUsage {
                    record: r.clone(),
                    facility_name,
                })
            })
            .collect();
        completed.sort_by(|a, b| b.record.exit_time.cmp(&a.record.exit_time));
        Ok(completed)
    }

    async fn count_opened_since(&self, since: DateTime<Utc>) -> Result<u64, StoreError> {
        Ok(self
            .inner
            .records
            .iter()
            .filter(|r| r.entry_time >= since)
            .count() as u64)
    }

    async fn count_records(&self) -> Result<u64, StoreError> {
        Ok(self.inner.records.len() as u64)
    }
}

impl Roster for MemoryStore {
    async fn list_courses(&self) -> Result<Vec<Course>, StoreError> {
        let mut courses: Vec<Course> = self.inner.courses.iter().map(|c| c.clone()).collect();
        courses.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(courses)
    }

    async fn insert_students(&self, students: &[NewStudent]) -> Result<u64, StoreError> {
        let mut roster = self.inner.students.lock();
        roster.extend_from_slice(students);
        Ok(students.len() as u64)
    }

    async fn count_students(&self) -> Result<u64, StoreError> {
        Ok(self.inner.students.lock().len() as u64)
    }

    async fn count_courses(&self) -> Result<u64, StoreError> {
        Ok(self.inner.courses.len() as u64)
    }
}

impl ChangeFeed for MemoryStore {
    async fn subscribe_facilities(&self) -> Result<Subscription<FacilityChange>, StoreError> {
        Ok(pump_broadcast(self.inner.facility_tx.subscribe()))
    }

    async fn subscribe_usage_inserts(&self) -> Result<Subscription<UsageInsert>, StoreError> {
        Ok(pump_broadcast(self.inner.usage_tx.subscribe()))
    }
}

/// Forward a broadcast receiver into a subscription's mpsc channel. A lagged
/// receiver skips ahead; consumers reconcile from authoritative queries, so
/// dropped events cost freshness, not correctness.
fn pump_broadcast<T: Clone + Send + 'static>(
    mut source: broadcast::Receiver<T>,
) -> Subscription<T> {
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let pump = tokio::spawn(async move {
        loop {
            match source.recv().await {
                Ok(event) => {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "change feed subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
    Subscription::new(rx, pump)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occupant(name: &str) -> Occupant {
        Occupant {
            occupant_name: name.to_string(),
            occupant_group: "1ESO A".to_string(),
            entry_note: None,
        }
    }

    #[tokio::test]
    async fn set_occupied_rejects_an_occupied_facility() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let id = store.seed_facility("Aseo Chicas 1", now);

        store.set_occupied(id, occupant("Ana"), now).await.unwrap();
        let err = store
            .set_occupied(id, occupant("Luis"), now)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Conflict { id: conflicted } if conflicted == id));

        // The loser's write left the row untouched.
        let facility = store.get(id).await.unwrap().unwrap();
        assert_eq!(
            facility.occupancy.occupant().unwrap().occupant_name,
            "Ana"
        );
    }

    #[tokio::test]
    async fn set_occupied_on_missing_facility_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .set_occupied(FacilityId::new(), occupant("Ana"), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn set_free_clears_the_occupant_regardless_of_state() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let id = store.seed_facility("Aseo Chicos 1", now);

        // Free on an already-free facility succeeds.
        store.set_free(id, now).await.unwrap();

        store.set_occupied(id, occupant("Ana"), now).await.unwrap();
        store.set_free(id, now).await.unwrap();
        let facility = store.get(id).await.unwrap().unwrap();
        assert!(facility.occupancy.is_free());
    }

    #[tokio::test]
    async fn list_is_ordered_by_name() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.seed_facility("Aseo Chicos 1", now);
        store.seed_facility("Aseo Chicas 1", now);
        let names: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["Aseo Chicas 1", "Aseo Chicos 1"]);
    }

    #[tokio::test]
    async fn close_record_is_single_shot() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let facility = store.seed_facility("Aseo Chicas 1", now);
        let record = store
            .open_record(facility, "Ana", "1ESO A", now)
            .await
            .unwrap();

        store
            .close_record(record, ExitCondition::Good, None, now)
            .await
            .unwrap();
        let err = store
            .close_record(record, ExitCondition::Poor, None, now)
            .await
            .unwrap_err();
        assert!(matches!(err, LogError::NotFound { .. }));
    }

    #[tokio::test]
    async fn find_open_record_reports_duplicates_instead_of_resolving() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let facility = store.seed_facility("Aseo Chicas 1", now);
        store
            .open_record(facility, "Ana", "1ESO A", now)
            .await
            .unwrap();
        store
            .open_record(facility, "Luis", "2ESO B", now)
            .await
            .unwrap();

        let err = store.find_open_record(facility).await.unwrap_err();
        assert!(matches!(err, LogError::MultipleOpen { count: 2, .. }));
    }

    #[tokio::test]
    async fn subscriptions_deliver_write_events() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let id = store.seed_facility("Aseo Chicas 1", now);
        let mut facilities = store.subscribe_facilities().await.unwrap();
        let mut usages = store.subscribe_usage_inserts().await.unwrap();

        store.set_occupied(id, occupant("Ana"), now).await.unwrap();
        store.open_record(id, "Ana", "1ESO A", now).await.unwrap();

        let change = facilities.recv().await.unwrap();
        assert_eq!(change.kind, ChangeKind::Update);
        assert_eq!(change.facility.id, id);

        let insert = usages.recv().await.unwrap();
        assert_eq!(insert.record.facility_id, id);
    }

    #[tokio::test]
    async fn roster_permits_duplicate_students() {
        let store = MemoryStore::new();
        let rows = vec![
            NewStudent {
                name: "Ana".into(),
                course: "1ESO A".into(),
            };
            2
        ];
        assert_eq!(store.insert_students(&rows).await.unwrap(), 2);
        assert_eq!(store.count_students().await.unwrap(), 2);
    }
}
