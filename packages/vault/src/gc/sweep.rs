use std::collections::HashSet;

use common::storage::ContentHash;
use sea_orm::sea_query::{Query, SelectStatement};
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, TransactionTrait};
use tracing::{debug, error, info, warn};

use super::SweepReport;
use crate::entity::{association, content_object};
use crate::error::VaultError;
use crate::index;
use crate::state::VaultState;

/// Remove every content object with zero associations, and its blob.
///
/// Never fails: problems with individual objects are logged and the object
/// is left for the next sweep or reconciliation.
pub async fn sweep_orphans(state: &VaultState) -> SweepReport {
    sweep(state, |_| {}).await
}

/// Sweep every orphan, reporting only those whose hash is in `hashes`.
///
/// Orphans outside `hashes` are still reclaimed and logged; they are left
/// out of the returned report.
pub async fn sweep_orphans_among(
    state: &VaultState,
    hashes: &HashSet<String>,
) -> SweepReport {
    let mut attributed = SweepReport::default();
    sweep(state, |(hash, freed)| {
        if hashes.contains(hash) {
            attributed.objects_reaped += 1;
            attributed.bytes_freed += freed;
        }
    })
    .await;
    attributed
}

async fn sweep<F>(state: &VaultState, mut on_reaped: F) -> SweepReport
where
    F: FnMut((&str, u64)),
{
    let _gate = state.reap_gate.write().await;
    let mut report = SweepReport::default();

    let orphans = match find_orphans(&state.db).await {
        Ok(orphans) => orphans,
        Err(e) => {
            error!(error = %e, "Failed to query orphan content objects");
            return report;
        }
    };

    if orphans.is_empty() {
        return report;
    }
    debug!(count = orphans.len(), "Found orphan content objects");

    for orphan in orphans {
        match reap_object(state, &orphan).await {
            Ok(Some(freed)) => {
                report.objects_reaped += 1;
                report.bytes_freed += freed;
                on_reaped((&orphan.hash, freed));
            }
            Ok(None) => {}
            Err(e) => {
                warn!(hash = %orphan.hash, error = %e, "Failed to reap orphan content object");
            }
        }
    }

    if report.objects_reaped > 0 {
        info!(
            objects_reaped = report.objects_reaped,
            bytes_freed = report.bytes_freed,
            "Orphan sweep finished"
        );
    }
    report
}

/// `SELECT content_hash FROM association`
pub(super) fn referenced_subquery() -> SelectStatement {
    Query::select()
        .column(association::Column::ContentHash)
        .from(association::Entity)
        .to_owned()
}

async fn find_orphans<C: ConnectionTrait>(db: &C) -> Result<Vec<content_object::Model>, DbErr> {
    content_object::Entity::find()
        .filter(content_object::Column::Hash.not_in_subquery(referenced_subquery()))
        .all(db)
        .await
}

/// Delete the row of `hash` if nothing references it, inside one transaction.
///
/// Returns whether a row was deleted.
pub(super) async fn delete_unreferenced_row(
    state: &VaultState,
    hash: &str,
) -> Result<bool, VaultError> {
    let txn = state.db.begin().await?;

    if index::count_references(&txn, hash).await? > 0 {
        txn.rollback().await?;
        return Ok(false);
    }

    let deleted = content_object::Entity::delete_many()
        .filter(content_object::Column::Hash.eq(hash))
        .filter(content_object::Column::Hash.not_in_subquery(referenced_subquery()))
        .exec(&txn)
        .await?;
    txn.commit().await?;

    Ok(deleted.rows_affected > 0)
}

/// Returns the bytes freed, or `None` if the object turned out to be live.
async fn reap_object(
    state: &VaultState,
    orphan: &content_object::Model,
) -> Result<Option<u64>, VaultError> {
    if !delete_unreferenced_row(state, &orphan.hash).await? {
        debug!(hash = %orphan.hash, "Orphan regained a reference, keeping it");
        return Ok(None);
    }

    // Another writer may have re-created the row after our commit.
    if content_object::Entity::find_by_id(orphan.hash.clone())
        .one(&state.db)
        .await?
        .is_some()
    {
        debug!(hash = %orphan.hash, "Content object re-created after delete, keeping blob");
        return Ok(None);
    }

    let hash = ContentHash::from_hex(&orphan.hash)?;
    let removed = state.blob_store.delete(&hash).await?;
    if !removed {
        warn!(hash = %orphan.hash, "Orphan content object had no blob");
    }

    Ok(Some(if removed { orphan.size.max(0) as u64 } else { 0 }))
}
