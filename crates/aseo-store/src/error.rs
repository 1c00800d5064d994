//! Store error types.
//!
//! [`StoreError`] covers the transport itself; [`RegistryError`] and
//! [`LogError`] add the per-seam outcomes (conflict on a lost race, missing
//! rows, multiple open records) that callers must distinguish from transport
//! failures.

use aseo_core::{FacilityId, RecordId};

/// Failure of the underlying store, independent of which seam was used.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Network/store unavailability or query failure.
    #[error("store transport failure during {operation}: {source}")]
    Transport {
        /// The logical operation that was running, e.g. `registry.list`.
        operation: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A row came back in a shape the domain model refuses, e.g. an occupied
    /// facility without occupant fields.
    #[error("undecodable {entity} row: {detail}")]
    Decode {
        entity: &'static str,
        detail: String,
    },
}

impl StoreError {
    /// Wrap a transport-layer error under the operation that issued it.
    pub fn transport(
        operation: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Transport {
            operation,
            source: source.into(),
        }
    }
}

/// Outcomes of facility registry writes.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The facility id does not exist.
    #[error("facility {id} not found")]
    NotFound { id: FacilityId },

    /// `set_occupied` lost the race: the row exists but is already occupied.
    /// This conditional check is the last line of defense when two clients
    /// pick the same free facility concurrently.
    #[error("facility {id} is already occupied")]
    Conflict { id: FacilityId },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcomes of usage log reads and writes.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// The record does not exist, or was already closed by someone else.
    #[error("usage record {id} not found or already closed")]
    NotFound { id: RecordId },

    /// More than one open record for one facility. The protocol never
    /// produces this; it is reported for reconciliation, never resolved
    /// silently.
    #[error("facility {id} has {count} open usage records, expected at most one")]
    MultipleOpen { id: FacilityId, count: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}
