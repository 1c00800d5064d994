//! # aseo-occupancy — Occupancy Workflows
//!
//! The non-trivial part of the tracker lives here:
//!
//! - [`protocol`]: the entry/exit transition protocol. Each transition is a
//!   pair of dependent single-row writes against two entities with no
//!   multi-row transaction underneath; the protocol orders the writes so
//!   that the only irreducible inconsistency window is explicitly detectable
//!   and surfaced as a distinct fault.
//! - [`sync`]: the live dashboard synchronizer: a cached facility board
//!   kept current from the change feed, with a query-backed usage counter.
//! - [`audit`]: the out-of-band reconciliation pass that finds the residue
//!   partial transitions leave behind.

pub mod audit;
pub mod protocol;
pub mod sync;

pub use audit::{run_audit, AuditFinding};
pub use protocol::{register_entry, register_exit, EntryRequest, ExitRequest, TransitionError};
pub use sync::{Board, LiveView};
