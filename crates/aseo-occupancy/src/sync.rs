//! # Live View Synchronizer
//!
//! Keeps a client-local facility board current from the change feed instead
//! of polling. Two independent subscriptions feed one event loop, so events
//! are handled to completion one at a time; across the two streams no
//! delivery order is guaranteed, which is why the usage counter is always
//! re-read from an authoritative count query instead of being incremented
//! from event payloads.

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use aseo_core::{start_of_local_day, Facility};
use aseo_store::error::StoreError;
use aseo_store::feed::{ChangeKind, FacilityChange};
use aseo_store::{ChangeFeed, FacilityRegistry, UsageLog};

/// Snapshot of what the dashboard shows: the cached facility rows plus the
/// count of cycles opened since local midnight.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Board {
    pub facilities: Vec<Facility>,
    pub usage_today: u64,
}

impl Board {
    /// Apply one facility change. Updates replace the cached entity by id
    /// with the full event payload, never a field merge; updates for ids
    /// not in the cache are dropped. Inserts append.
    fn apply_facility(&mut self, change: FacilityChange) {
        match change.kind {
            ChangeKind::Update => {
                if let Some(slot) = self
                    .facilities
                    .iter_mut()
                    .find(|f| f.id == change.facility.id)
                {
                    *slot = change.facility;
                }
            }
            ChangeKind::Insert => self.facilities.push(change.facility),
        }
    }
}

/// A running synchronizer. Holds its subscriptions through a background
/// task; dropping the view aborts the task, which releases both listeners,
/// so a view that goes away cannot keep feeding a dead screen.
pub struct LiveView {
    board: watch::Receiver<Board>,
    task: JoinHandle<()>,
}

impl LiveView {
    /// Load the initial board state and start following the change feed.
    pub async fn spawn<S>(store: S) -> Result<Self, StoreError>
    where
        S: FacilityRegistry + UsageLog + ChangeFeed + Send + Sync + 'static,
    {
        let facilities = store.list().await?;
        let usage_today = store
            .count_opened_since(start_of_local_day(Utc::now()))
            .await?;
        let mut facility_events = store.subscribe_facilities().await?;
        let mut usage_events = store.subscribe_usage_inserts().await?;

        let (tx, board) = watch::channel(Board {
            facilities,
            usage_today,
        });

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    change = facility_events.recv() => match change {
                        Some(change) => tx.send_modify(|board| board.apply_facility(change)),
                        None => break,
                    },
                    insert = usage_events.recv() => match insert {
                        Some(_) => {
                            // The event only signals that something was
                            // inserted; re-reading the count keeps the
                            // number right across day boundaries and
                            // out-of-order delivery.
                            let since = start_of_local_day(Utc::now());
                            match store.count_opened_since(since).await {
                                Ok(count) => {
                                    tx.send_modify(|board| board.usage_today = count);
                                }
                                Err(e) => {
                                    tracing::warn!(error = %e, "usage counter refresh failed");
                                }
                            }
                        }
                        None => break,
                    },
                }
            }
        });

        Ok(Self { board, task })
    }

    /// Current board snapshot.
    pub fn board(&self) -> Board {
        self.board.borrow().clone()
    }

    /// Wait until the board changes. Returns `false` once the feed has
    /// ended and no further changes will arrive.
    pub async fn changed(&mut self) -> bool {
        self.board.changed().await.is_ok()
    }
}

impl Drop for LiveView {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aseo_core::{FacilityId, Occupancy, Occupant};
    use chrono::Utc;

    fn facility(id: FacilityId, name: &str) -> Facility {
        Facility {
            id,
            name: name.to_string(),
            occupancy: Occupancy::Free,
            last_change: Utc::now(),
        }
    }

    #[test]
    fn update_replaces_matching_entity_wholesale() {
        let id = FacilityId::new();
        let mut board = Board {
            facilities: vec![facility(id, "Aseo Chicas 1")],
            usage_today: 0,
        };
        let mut updated = facility(id, "Aseo Chicas 1");
        updated.occupancy = Occupancy::Occupied(Occupant {
            occupant_name: "Ana".into(),
            occupant_group: "1ESO A".into(),
            entry_note: None,
        });
        board.apply_facility(FacilityChange {
            kind: ChangeKind::Update,
            facility: updated.clone(),
        });
        assert_eq!(board.facilities, vec![updated]);
    }

    #[test]
    fn update_for_unknown_id_is_dropped() {
        let mut board = Board {
            facilities: vec![facility(FacilityId::new(), "Aseo Chicas 1")],
            usage_today: 0,
        };
        let before = board.facilities.clone();
        board.apply_facility(FacilityChange {
            kind: ChangeKind::Update,
            facility: facility(FacilityId::new(), "Aseo Fantasma"),
        });
        assert_eq!(board.facilities, before);
    }

    #[test]
    fn insert_appends() {
        let mut board = Board::default();
        board.apply_facility(FacilityChange {
            kind: ChangeKind::Insert,
            facility: facility(FacilityId::new(), "Aseo Chicos 1"),
        });
        assert_eq!(board.facilities.len(), 1);
    }
}
