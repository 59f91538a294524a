//! Operations exposed to the embedding service.
//!
//! Every operation takes the shared [`VaultState`], validates its arguments
//! before touching any store, serializes on the instance lock when it
//! mutates, and runs its metadata changes in one transaction.

pub mod files;
pub mod ingest;
pub mod instance;
pub mod manifest;

use std::collections::HashMap;

use bytes::Bytes;
use chrono::Utc;
use common::storage::ContentHash;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseTransaction, DbErr, EntityTrait, QueryFilter, Set,
};
use tracing::{debug, info, warn};

pub use files::{
    delete_file, list_files, move_file, read_config, set_file_side, update_config,
    upsert_single_file,
};
pub use ingest::ingest_bundle;
pub use instance::{delete_instance, list_instances};
pub use manifest::build_manifest;

use crate::archive::path::sanitize_entry_path;
use crate::entity::{content_object, instance as instance_entity};
use crate::error::VaultError;
use crate::state::VaultState;

/// Commit on success, roll back on failure.
pub(crate) async fn finish_txn<T>(
    txn: DatabaseTransaction,
    outcome: Result<T, VaultError>,
) -> Result<T, VaultError> {
    match outcome {
        Ok(value) => {
            txn.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = txn.rollback().await {
                warn!(error = %rollback, "Rollback failed");
            }
            Err(e)
        }
    }
}

pub(crate) async fn require_instance<C: ConnectionTrait>(
    db: &C,
    instance_id: &str,
) -> Result<instance_entity::Model, VaultError> {
    instance_entity::Entity::find_by_id(instance_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| VaultError::NotFound(format!("instance '{instance_id}'")))
}

/// Normalize a caller-supplied install path, rejecting anything unsafe.
pub(crate) fn clean_path(path: &str) -> Result<String, VaultError> {
    sanitize_entry_path(path)
        .map_err(|reason| VaultError::PathUnsafe(format!("'{path}': {}", reason.message())))
}

/// Make sure `hash` has a blob and a content object row.
///
/// Returns `true` if the content is new to the vault. Blobs this call wrote
/// are appended to `created` so a failed transaction can remove them.
pub(crate) async fn store_content<C: ConnectionTrait>(
    db: &C,
    state: &VaultState,
    hash: &ContentHash,
    filename: &str,
    data: Bytes,
    created: &mut Vec<ContentHash>,
) -> Result<bool, VaultError> {
    let hex = hash.to_hex();
    if content_object::Entity::find_by_id(hex.clone())
        .one(db)
        .await?
        .is_some()
    {
        return Ok(false);
    }

    let size = data.len() as i64;
    if state.blob_store.put(hash, data).await? {
        created.push(*hash);
    } else {
        debug!(hash = %hex, "Blob already present without metadata, reusing it");
    }

    let model = content_object::ActiveModel {
        hash: Set(hex),
        filename: Set(filename.to_string()),
        size: Set(size),
        locator: Set(state.blob_store.locator(hash)),
        created_at: Set(Utc::now()),
    };
    content_object::Entity::insert(model)
        .on_conflict(
            OnConflict::column(content_object::Column::Hash)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    Ok(true)
}

/// Delete blobs written by a transaction that did not commit.
///
/// A blob is kept if a committed content object claims its hash: a
/// concurrent writer stored the same content and now depends on it.
pub(crate) async fn compensate(state: &VaultState, created: &[ContentHash]) {
    if created.is_empty() {
        return;
    }

    let _gate = state.reap_gate.write().await;
    let mut removed = 0usize;

    for hash in created {
        match content_object::Entity::find_by_id(hash.to_hex())
            .one(&state.db)
            .await
        {
            Ok(Some(_)) => {
                debug!(%hash, "Blob claimed by a committed content object, keeping it");
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(%hash, error = %e, "Cannot check blob ownership, leaving it to reconciliation");
                continue;
            }
        }

        match state.blob_store.delete(hash).await {
            Ok(_) => removed += 1,
            Err(e) => warn!(%hash, error = %e, "Failed to remove blob of a rolled back write"),
        }
    }

    info!(removed, written = created.len(), "Compensated blobs of failed write");
}

/// Content objects for `hashes`, keyed by hash.
pub(crate) async fn load_contents<C: ConnectionTrait>(
    db: &C,
    hashes: impl IntoIterator<Item = String>,
) -> Result<HashMap<String, content_object::Model>, DbErr> {
    let hashes: Vec<String> = hashes.into_iter().collect();
    if hashes.is_empty() {
        return Ok(HashMap::new());
    }

    let objects = content_object::Entity::find()
        .filter(content_object::Column::Hash.is_in(hashes))
        .all(db)
        .await?;
    Ok(objects
        .into_iter()
        .map(|object| (object.hash.clone(), object))
        .collect())
}
