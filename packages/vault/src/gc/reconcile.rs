use std::collections::HashSet;

use chrono::Utc;
use common::storage::BlobInfo;
use futures::TryStreamExt;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::sweep::{delete_unreferenced_row, sweep_orphans};
use super::ReconcileReport;
use crate::error::VaultError;
use crate::index;
use crate::state::VaultState;

/// Run periodic reconciliation until `shutdown` is cancelled.
///
/// Waits `gc.initial_delay_secs`, then runs a pass every `gc.interval_secs`.
/// A failed pass is logged and retried on the next tick.
pub async fn run_reconciliation_loop(state: VaultState, shutdown: CancellationToken) {
    let gc = state.config.gc.clone();

    info!(
        initial_delay_secs = gc.initial_delay_secs,
        interval_secs = gc.interval_secs,
        min_blob_age_secs = gc.min_blob_age_secs,
        "Starting reconciliation loop"
    );

    tokio::select! {
        _ = shutdown.cancelled() => {
            info!("Reconciliation loop stopped");
            return;
        }
        _ = tokio::time::sleep(gc.initial_delay()) => {}
    }

    let mut interval = tokio::time::interval(gc.interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {}
        }

        match reconcile(&state).await {
            Ok(report) => info!(
                orphans_reaped = report.sweep.objects_reaped,
                scanned = report.scanned,
                reaped = report.reaped,
                bytes_freed = report.sweep.bytes_freed + report.bytes_freed,
                skipped_young = report.skipped_young,
                "Reconciliation pass finished"
            ),
            Err(e) => error!(error = %e, "Reconciliation pass failed"),
        }
    }

    info!("Reconciliation loop stopped");
}

/// Sweep orphan rows, then delete backing-store blobs no association references.
///
/// Blobs younger than `gc.min_blob_age_secs` are skipped: an ingestion may
/// have written them without committing its metadata yet.
#[instrument(skip(state))]
pub async fn reconcile(state: &VaultState) -> Result<ReconcileReport, VaultError> {
    let mut report = ReconcileReport {
        sweep: sweep_orphans(state).await,
        ..ReconcileReport::default()
    };

    let live = index::referenced_hashes(&state.db).await?;
    let cutoff = Utc::now() - state.config.gc.min_blob_age();
    let batch_size = state.config.gc.batch_size.max(1);
    debug!(live = live.len(), %cutoff, "Scanning backing store");

    let mut listing = state.blob_store.list();
    let mut batch: Vec<BlobInfo> = Vec::with_capacity(batch_size);

    while let Some(info) = listing.try_next().await? {
        report.scanned += 1;
        if live.contains(&info.hash.to_hex()) {
            continue;
        }
        if info.last_modified > cutoff {
            report.skipped_young += 1;
            continue;
        }

        batch.push(info);
        if batch.len() >= batch_size {
            reap_batch(state, std::mem::take(&mut batch), &mut report).await?;
        }
    }

    if !batch.is_empty() {
        reap_batch(state, batch, &mut report).await?;
    }

    Ok(report)
}

/// Delete a batch of candidate blobs, re-reading live references first.
async fn reap_batch(
    state: &VaultState,
    batch: Vec<BlobInfo>,
    report: &mut ReconcileReport,
) -> Result<(), VaultError> {
    let _gate = state.reap_gate.write().await;

    let hashes: Vec<String> = batch.iter().map(|info| info.hash.to_hex()).collect();
    let live: HashSet<String> = index::referenced_among(&state.db, &hashes).await?;

    for (info, hex) in batch.into_iter().zip(hashes) {
        if live.contains(&hex) {
            debug!(hash = %hex, "Blob gained a reference, keeping it");
            continue;
        }

        match reap_blob(state, &info, &hex).await {
            Ok(true) => {
                report.reaped += 1;
                report.bytes_freed += info.size;
            }
            Ok(false) => {}
            Err(e) => warn!(hash = %hex, error = %e, "Failed to reap unreferenced blob"),
        }
    }

    Ok(())
}

async fn reap_blob(state: &VaultState, info: &BlobInfo, hex: &str) -> Result<bool, VaultError> {
    // A stray metadata row goes first; an absent one is fine.
    delete_unreferenced_row(state, hex).await?;
    if index::count_references(&state.db, hex).await? > 0 {
        return Ok(false);
    }

    Ok(state.blob_store.delete(&info.hash).await?)
}
