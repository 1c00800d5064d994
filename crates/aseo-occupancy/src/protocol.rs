//! # Occupancy Transition Protocol
//!
//! The registry row and the usage log must move together, but the store
//! offers no multi-row atomic commit. Both transitions therefore write in a
//! fixed order: first the write whose failure leaves no visible side effect,
//! then the write whose failure opens the one irreducible inconsistency
//! window. That second failure is never retried here (a retry could
//! double-write or race a later transition on the same facility); it is
//! surfaced as a distinct partial-state fault so reconciliation can find it.
//!
//! Entry writes the facility first, then opens the log record. Exit closes
//! the log record first, then frees the facility.

use chrono::{DateTime, Utc};

use aseo_core::{ExitCondition, FacilityId, Occupant, RecordId};
use aseo_store::error::{LogError, RegistryError, StoreError};
use aseo_store::{FacilityRegistry, UsageLog};

/// Everything an entry needs, as collected by the entry form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRequest {
    pub facility: FacilityId,
    pub student_name: String,
    pub student_group: String,
    pub note: Option<String>,
}

/// Everything an exit needs, as collected by the exit form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitRequest {
    pub facility: FacilityId,
    pub condition: ExitCondition,
    pub note: Option<String>,
}

/// Failures of an occupancy transition.
///
/// `PartialEntry` and `PartialExit` are the two halves of the paired-write
/// window: the first write committed, the second did not, and the data now
/// needs reconciliation. They must never be collapsed into a generic
/// failure.
#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    /// A required field was missing or blank; nothing reached the store.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The facility was already occupied at write time (lost race).
    #[error("facility {id} is already occupied")]
    Conflict { id: FacilityId },

    /// The facility id does not exist.
    #[error("facility {id} not found")]
    FacilityNotFound { id: FacilityId },

    /// No open cycle for this facility: its state was stale when selected,
    /// or another client closed the cycle first.
    #[error("no open usage record for facility {id}")]
    NoOpenCycle { id: FacilityId },

    /// More than one open record for one facility. Reported for
    /// reconciliation, never resolved here.
    #[error("facility {id} has {count} open usage records, manual reconciliation required")]
    Consistency { id: FacilityId, count: usize },

    /// Entry write B failed after write A committed: the facility shows
    /// occupied with no backing open record.
    #[error("partial entry on facility {id}: occupied without a usage record ({source})")]
    PartialEntry {
        id: FacilityId,
        #[source]
        source: StoreError,
    },

    /// Exit write B failed after write A committed: the record is closed but
    /// the facility still shows occupied.
    #[error("partial exit on facility {id}: record {record} closed but facility still occupied ({source})")]
    PartialExit {
        id: FacilityId,
        record: RecordId,
        #[source]
        source: RegistryError,
    },

    /// Store/network failure before anything committed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn non_blank(value: &str, field: &str) -> Result<String, TransitionError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TransitionError::Validation(format!("{field} must not be blank")));
    }
    Ok(trimmed.to_string())
}

fn normalize_note(note: Option<String>) -> Option<String> {
    note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}

/// Register an entry: mark the facility occupied, then open its usage
/// record. Returns the new record id.
///
/// The caller is expected to have picked the facility from a
/// freshness-checked free list, but that is advisory only; the registry's
/// conditional write is what actually arbitrates a race.
pub async fn register_entry<S>(
    store: &S,
    request: EntryRequest,
    now: DateTime<Utc>,
) -> Result<RecordId, TransitionError>
where
    S: FacilityRegistry + UsageLog + Sync,
{
    let student_name = non_blank(&request.student_name, "student name")?;
    let student_group = non_blank(&request.student_group, "student group")?;
    let facility = request.facility;

    let occupant = Occupant {
        occupant_name: student_name.clone(),
        occupant_group: student_group.clone(),
        entry_note: normalize_note(request.note),
    };

    // Write A: flip the facility. Any failure here aborts the transition
    // with no visible side effect.
    store
        .set_occupied(facility, occupant, now)
        .await
        .map_err(|e| match e {
            RegistryError::Conflict { id } => TransitionError::Conflict { id },
            RegistryError::NotFound { id } => TransitionError::FacilityNotFound { id },
            RegistryError::Store(e) => TransitionError::Store(e),
        })?;

    // Write B: open the log record. Failure past this point leaves the
    // facility occupied with nothing backing it.
    match store
        .open_record(facility, &student_name, &student_group, now)
        .await
    {
        Ok(record) => {
            tracing::debug!(%facility, %record, "entry registered");
            Ok(record)
        }
        Err(source) => {
            tracing::error!(
                %facility,
                error = %source,
                "partial entry: facility occupied without a usage record"
            );
            Err(TransitionError::PartialEntry {
                id: facility,
                source,
            })
        }
    }
}

/// Register an exit: close the open usage record, then free the facility.
pub async fn register_exit<S>(
    store: &S,
    request: ExitRequest,
    now: DateTime<Utc>,
) -> Result<(), TransitionError>
where
    S: FacilityRegistry + UsageLog + Sync,
{
    let facility = request.facility;

    let open = store.find_open_record(facility).await.map_err(|e| match e {
        LogError::MultipleOpen { id, count } => TransitionError::Consistency { id, count },
        LogError::NotFound { .. } => TransitionError::NoOpenCycle { id: facility },
        LogError::Store(e) => TransitionError::Store(e),
    })?;
    let record = match open {
        Some(record) => record.id,
        None => return Err(TransitionError::NoOpenCycle { id: facility }),
    };

    let note = normalize_note(request.note);

    // Write A: close the record. On failure the facility stays occupied and
    // nothing partial exists.
    store
        .close_record(record, request.condition, note.as_deref(), now)
        .await
        .map_err(|e| match e {
            // Someone closed it between the lookup and the write.
            LogError::NotFound { .. } => TransitionError::NoOpenCycle { id: facility },
            LogError::MultipleOpen { id, count } => TransitionError::Consistency { id, count },
            LogError::Store(e) => TransitionError::Store(e),
        })?;

    // Write B: free the facility. Failure here is the inverse partial window.
    match store.set_free(facility, now).await {
        Ok(()) => {
            tracing::debug!(%facility, %record, "exit registered");
            Ok(())
        }
        Err(source) => {
            tracing::error!(
                %facility,
                %record,
                error = %source,
                "partial exit: record closed but facility still occupied"
            );
            Err(TransitionError::PartialExit {
                id: facility,
                record,
                source,
            })
        }
    }
}
