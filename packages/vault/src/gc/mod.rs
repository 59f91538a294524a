//! Reclaiming content nobody references.
//!
//! Two passes share one deletion protocol: the metadata row goes first, in a
//! transaction that re-counts references, and the blob follows only once the
//! row is confirmed gone. Both take [`VaultState::reap_gate`] exclusively so
//! an in-process ingestion never sees a blob vanish under its transaction.
//!
//! [`VaultState::reap_gate`]: crate::state::VaultState::reap_gate

mod reconcile;
mod sweep;

use serde::Serialize;

pub use reconcile::{reconcile, run_reconciliation_loop};
pub use sweep::{sweep_orphans, sweep_orphans_among};

/// Outcome of one synchronous orphan sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub objects_reaped: u64,
    pub bytes_freed: u64,
}

/// Outcome of one full reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// The orphan sweep that opened the pass.
    pub sweep: SweepReport,
    /// Blobs seen in the backing-store listing.
    pub scanned: u64,
    /// Unreferenced blobs removed from the backing store.
    pub reaped: u64,
    pub bytes_freed: u64,
    /// Unreferenced blobs left alone because they are younger than `min_blob_age`.
    pub skipped_young: u64,
}
