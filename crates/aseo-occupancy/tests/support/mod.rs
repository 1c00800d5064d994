//! Test support: a store wrapper that injects single-shot write failures so
//! the paired-write windows can be exercised deterministically.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};

use aseo_core::{
    CompletedUsage, ExitCondition, Facility, FacilityId, Occupant, OccupancyState, RecordId,
    UsageRecord,
};
use aseo_store::error::{LogError, RegistryError, StoreError};
use aseo_store::{FacilityRegistry, MemoryStore, UsageLog};

/// Delegates everything to a [`MemoryStore`], except that the next
/// `open_record` or `set_free` can be armed to fail with a transport error.
pub struct FaultStore {
    pub inner: MemoryStore,
    fail_open_record: AtomicBool,
    fail_close_record: AtomicBool,
    fail_set_free: AtomicBool,
}

impl FaultStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            fail_open_record: AtomicBool::new(false),
            fail_close_record: AtomicBool::new(false),
            fail_set_free: AtomicBool::new(false),
        }
    }

    /// Arm a one-shot failure of the next `open_record` call.
    pub fn fail_next_open_record(&self) {
        self.fail_open_record.store(true, Ordering::SeqCst);
    }

    /// Arm a one-shot failure of the next `close_record` call.
    pub fn fail_next_close_record(&self) {
        self.fail_close_record.store(true, Ordering::SeqCst);
    }

    /// Arm a one-shot failure of the next `set_free` call.
    pub fn fail_next_set_free(&self) {
        self.fail_set_free.store(true, Ordering::SeqCst);
    }
}

impl FacilityRegistry for FaultStore {
    async fn list(&self) -> Result<Vec<Facility>, StoreError> {
        self.inner.list().await
    }

    async fn list_by_state(&self, state: OccupancyState) -> Result<Vec<Facility>, StoreError> {
        self.inner.list_by_state(state).await
    }

    async fn get(&self, id: FacilityId) -> Result<Option<Facility>, StoreError> {
        self.inner.get(id).await
    }

    async fn set_occupied(
        &self,
        id: FacilityId,
        occupant: Occupant,
        now: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        self.inner.set_occupied(id, occupant, now).await
    }

    async fn set_free(&self, id: FacilityId, now: DateTime<Utc>) -> Result<(), RegistryError> {
        if self.fail_set_free.swap(false, Ordering::SeqCst) {
            return Err(RegistryError::Store(StoreError::transport(
                "registry.set_free",
                "injected write failure",
            )));
        }
        self.inner.set_free(id, now).await
    }
}

impl UsageLog for FaultStore {
    async fn open_record(
        &self,
        facility_id: FacilityId,
        student_name: &str,
        student_group: &str,
        now: DateTime<Utc>,
    ) -> Result<RecordId, StoreError> {
        if self.fail_open_record.swap(false, Ordering::SeqCst) {
            return Err(StoreError::transport(
                "log.open_record",
                "injected write failure",
            ));
        }
        self.inner
            .open_record(facility_id, student_name, student_group, now)
            .await
    }

    async fn find_open_record(
        &self,
        facility_id: FacilityId,
    ) -> Result<Option<UsageRecord>, LogError> {
        self.inner.find_open_record(facility_id).await
    }

    async fn close_record(
        &self,
        id: RecordId,
        condition: ExitCondition,
        note: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), LogError> {
        if self.fail_close_record.swap(false, Ordering::SeqCst) {
            return Err(LogError::Store(StoreError::transport(
                "log.close_record",
                "injected write failure",
            )));
        }
        self.inner.close_record(id, condition, note, now).await
    }

    async fn open_records(&self) -> Result<Vec<UsageRecord>, StoreError> {
        self.inner.open_records().await
    }

    async fn completed_today(&self, since: DateTime<Utc>) -> Result<Vec<CompletedUsage>, StoreError> {
        self.inner.completed_today(since).await
    }

    async fn count_opened_since(&self, since: DateTime<Utc>) -> Result<u64, StoreError> {
        self.inner.count_opened_since(since).await
    }

    async fn count_records(&self) -> Result<u64, StoreError> {
        self.inner.count_records().await
    }
}
