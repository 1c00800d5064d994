//! # Reconciliation Audit
//!
//! Partial transitions leave a detectable residue: a facility marked
//! occupied with no open record, or a closed record behind a still-occupied
//! facility. This pass pairs registry truth with log truth and reports every
//! mismatch. It is read-only: findings are for operators to act on, not for
//! the code to repair, since an automatic fix could race a live transition.

use std::collections::HashMap;

use aseo_core::{FacilityId, RecordId};
use aseo_store::error::StoreError;
use aseo_store::{FacilityRegistry, UsageLog};

/// One registry/log mismatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditFinding {
    /// The residue of a partial transition. A failed entry leaves the
    /// facility flipped with no record created; a failed exit leaves the
    /// record closed with the facility still flipped. Both end up here.
    OccupiedWithoutOpenRecord { facility: FacilityId, name: String },

    /// An open record whose facility is not occupied. The protocol's write
    /// order cannot produce this on its own; an out-of-band facility edit
    /// can. Reported so nothing is ever silently orphaned.
    OpenRecordWithoutOccupiedFacility {
        record: RecordId,
        facility: FacilityId,
    },

    /// The single-open-record rule is broken outright.
    MultipleOpenRecords { facility: FacilityId, count: usize },
}

impl std::fmt::Display for AuditFinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OccupiedWithoutOpenRecord { facility, name } => write!(
                f,
                "facility {facility} ('{name}') is occupied but has no open usage record"
            ),
            Self::OpenRecordWithoutOccupiedFacility { record, facility } => write!(
                f,
                "usage record {record} is open but facility {facility} is not occupied"
            ),
            Self::MultipleOpenRecords { facility, count } => write!(
                f,
                "facility {facility} has {count} open usage records, expected at most one"
            ),
        }
    }
}

/// Compare registry state against the open records and report every
/// inconsistency between them.
pub async fn run_audit<S>(store: &S) -> Result<Vec<AuditFinding>, StoreError>
where
    S: FacilityRegistry + UsageLog + Sync,
{
    let facilities = store.list().await?;
    let open = store.open_records().await?;

    let mut open_by_facility: HashMap<FacilityId, Vec<RecordId>> = HashMap::new();
    for record in &open {
        open_by_facility
            .entry(record.facility_id)
            .or_default()
            .push(record.id);
    }

    let mut findings = Vec::new();

    // Occupied facilities lacking a backing record, in board order.
    for facility in &facilities {
        if !facility.occupancy.is_free() && !open_by_facility.contains_key(&facility.id) {
            findings.push(AuditFinding::OccupiedWithoutOpenRecord {
                facility: facility.id,
                name: facility.name.clone(),
            });
        }
    }

    // Open records whose facility is free or unknown, in entry order.
    for record in &open {
        let occupied = facilities
            .iter()
            .find(|f| f.id == record.facility_id)
            .map(|f| !f.occupancy.is_free())
            .unwrap_or(false);
        if !occupied {
            findings.push(AuditFinding::OpenRecordWithoutOccupiedFacility {
                record: record.id,
                facility: record.facility_id,
            });
        }
    }

    // Facilities breaking the single-open-record rule.
    for facility in &facilities {
        if let Some(records) = open_by_facility.get(&facility.id) {
            if records.len() > 1 {
                findings.push(AuditFinding::MultipleOpenRecords {
                    facility: facility.id,
                    count: records.len(),
                });
            }
        }
    }

    if !findings.is_empty() {
        tracing::error!(count = findings.len(), "audit found registry/log mismatches");
    }
    Ok(findings)
}
