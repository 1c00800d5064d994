//! # Change Feed
//!
//! Live change notification from the store: one stream for facility rows
//! (inserts and updates), one for usage-record inserts. The two streams are
//! independent; no delivery ordering is guaranteed between them, and
//! delivery itself is best-effort; consumers must reconcile from
//! authoritative queries, not from event payloads alone.
//!
//! A [`Subscription`] owns its listener task and tears it down on drop, so a
//! view that goes away cannot leak a live listener.

use aseo_core::{Facility, UsageRecord};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// What happened to the row carried by a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
}

/// A facility row changed. The payload is the full new row state, not a
/// partial patch.
#[derive(Debug, Clone, PartialEq)]
pub struct FacilityChange {
    pub kind: ChangeKind,
    pub facility: Facility,
}

/// A usage record was inserted (an entry was registered somewhere).
#[derive(Debug, Clone, PartialEq)]
pub struct UsageInsert {
    pub record: UsageRecord,
}

/// A live event stream backed by a pump task. Dropping the subscription
/// aborts the pump and releases the underlying listener.
pub struct Subscription<T> {
    rx: mpsc::Receiver<T>,
    pump: JoinHandle<()>,
}

impl<T> Subscription<T> {
    pub(crate) fn new(rx: mpsc::Receiver<T>, pump: JoinHandle<()>) -> Self {
        Self { rx, pump }
    }

    /// Next event, or `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.pump.abort();
    }
}
