use bytes::Bytes;
use common::Side;
use common::storage::ContentHash;
use sea_orm::TransactionTrait;
use tracing::{info, instrument, warn};

use super::{
    clean_path, compensate, finish_txn, load_contents, require_instance, store_content,
};
use crate::archive::encoding::decode_text;
use crate::archive::path::file_name;
use crate::error::VaultError;
use crate::gc::sweep_orphans;
use crate::index;
use crate::models::file::is_config_path;
use crate::models::{FileNode, FileOpResponse, FileOpStatus};
use crate::state::VaultState;
use crate::utils::validate_instance_id;

/// Every file of an instance, ordered by install path.
#[instrument(skip(state))]
pub async fn list_files(state: &VaultState, instance_id: &str) -> Result<Vec<FileNode>, VaultError> {
    validate_instance_id(instance_id)?;
    require_instance(&state.db, instance_id).await?;

    let associations = index::list_for_instance(&state.db, instance_id).await?;
    let contents = load_contents(
        &state.db,
        associations.iter().map(|a| a.content_hash.clone()),
    )
    .await?;

    let mut files = Vec::with_capacity(associations.len());
    for association in associations {
        let Some(content) = contents.get(&association.content_hash) else {
            warn!(path = %association.path, hash = %association.content_hash, "Association without content object");
            continue;
        };
        files.push(FileNode {
            is_config: is_config_path(&association.path),
            path: association.path,
            filename: content.filename.clone(),
            size: content.size.max(0) as u64,
            hash: association.content_hash,
            side: association.side,
        });
    }
    Ok(files)
}

/// Store `data` at `path`, replacing any file already there.
///
/// A replaced file keeps its side tag; a new path is installed on both sides.
#[instrument(skip(state, data), fields(size = data.len()))]
pub async fn upsert_single_file(
    state: &VaultState,
    instance_id: &str,
    path: &str,
    filename: &str,
    data: Bytes,
) -> Result<FileOpResponse, VaultError> {
    let path = clean_path(path)?;
    let filename = match filename.trim() {
        "" => file_name(&path),
        given => given,
    }
    .to_string();

    put_file(state, instance_id, path, filename, data, FileOpStatus::Uploaded).await
}

/// Delete the file at `path`. Content nobody else uses is reclaimed.
#[instrument(skip(state))]
pub async fn delete_file(
    state: &VaultState,
    instance_id: &str,
    path: &str,
) -> Result<FileOpResponse, VaultError> {
    validate_instance_id(instance_id)?;
    let path = clean_path(path)?;
    let _guard = state.locks.lock(instance_id).await;

    let txn = state.db.begin().await?;
    let outcome = index::delete_by_path(&txn, instance_id, &path).await;
    let removed = finish_txn(txn, outcome).await?;

    let sweep = sweep_orphans(state).await;
    info!(
        hash = %removed.content_hash,
        orphans_reaped = sweep.objects_reaped,
        "File deleted"
    );
    Ok(FileOpResponse::new(FileOpStatus::Deleted, path))
}

#[instrument(skip(state))]
pub async fn set_file_side(
    state: &VaultState,
    instance_id: &str,
    path: &str,
    side: Side,
) -> Result<FileOpResponse, VaultError> {
    validate_instance_id(instance_id)?;
    let path = clean_path(path)?;
    let _guard = state.locks.lock(instance_id).await;

    index::set_side(&state.db, instance_id, &path, side).await?;
    Ok(FileOpResponse::new(FileOpStatus::SideUpdated, path))
}

/// Text of a configuration file.
///
/// Bytes that are not UTF-8 are read as Windows-1251.
#[instrument(skip(state))]
pub async fn read_config(
    state: &VaultState,
    instance_id: &str,
    path: &str,
) -> Result<String, VaultError> {
    validate_instance_id(instance_id)?;
    let path = clean_path(path)?;

    let association = index::find_by_path(&state.db, instance_id, &path)
        .await?
        .ok_or_else(|| VaultError::NotFound(format!("file '{path}' in instance '{instance_id}'")))?;

    let hash = ContentHash::from_hex(&association.content_hash)?;
    let bytes = state.blob_store.get(&hash).await?;
    Ok(decode_text(&bytes))
}

/// Replace a configuration file with `text`, stored as UTF-8.
#[instrument(skip(state, text), fields(len = text.len()))]
pub async fn update_config(
    state: &VaultState,
    instance_id: &str,
    path: &str,
    text: String,
) -> Result<FileOpResponse, VaultError> {
    let path = clean_path(path)?;
    let filename = file_name(&path).to_string();
    put_file(
        state,
        instance_id,
        path,
        filename,
        Bytes::from(text.into_bytes()),
        FileOpStatus::Updated,
    )
    .await
}

/// Re-key the file at `from` to `to`, replacing any file already at `to`.
#[instrument(skip(state))]
pub async fn move_file(
    state: &VaultState,
    instance_id: &str,
    from: &str,
    to: &str,
) -> Result<FileOpResponse, VaultError> {
    validate_instance_id(instance_id)?;
    let from = clean_path(from)?;
    let to = clean_path(to)?;
    let _guard = state.locks.lock(instance_id).await;

    let txn = state.db.begin().await?;
    let outcome = index::move_path(&txn, instance_id, &from, &to).await;
    let (_, displaced) = finish_txn(txn, outcome).await?;

    if let Some(hash) = displaced {
        let sweep = sweep_orphans(state).await;
        info!(%hash, orphans_reaped = sweep.objects_reaped, "Move replaced an existing file");
    }
    Ok(FileOpResponse::new(FileOpStatus::Moved, to))
}

async fn put_file(
    state: &VaultState,
    instance_id: &str,
    path: String,
    filename: String,
    data: Bytes,
    status: FileOpStatus,
) -> Result<FileOpResponse, VaultError> {
    validate_instance_id(instance_id)?;
    let limit = state.config.archive.max_upload_bytes;
    if data.len() as u64 > limit {
        return Err(VaultError::SizeExceeded { limit });
    }

    let hash = {
        let data = data.clone();
        tokio::task::spawn_blocking(move || ContentHash::compute(&data)).await?
    };

    let _guard = state.locks.lock(instance_id).await;

    let mut created = Vec::new();
    let result = {
        let _gate = state.reap_gate.read().await;
        write_file(state, instance_id, &path, &filename, &hash, data, &mut created).await
    };

    match result {
        Ok(displaced) => {
            if displaced.is_some_and(|old| old != hash.to_hex()) {
                sweep_orphans(state).await;
            }
            info!(path = %path, %hash, "File stored");
            Ok(FileOpResponse::new(status, path))
        }
        Err(e) => {
            compensate(state, &created).await;
            Err(e)
        }
    }
}

/// Returns the hash the write displaced, if the path was occupied.
async fn write_file(
    state: &VaultState,
    instance_id: &str,
    path: &str,
    filename: &str,
    hash: &ContentHash,
    data: Bytes,
    created: &mut Vec<ContentHash>,
) -> Result<Option<String>, VaultError> {
    let txn = state.db.begin().await?;

    let outcome = async {
        require_instance(&txn, instance_id).await?;
        store_content(&txn, state, hash, filename, data, created).await?;

        let side = index::find_by_path(&txn, instance_id, path)
            .await?
            .map(|existing| existing.side)
            .unwrap_or_default();
        let (_, displaced) = index::upsert_by_path(&txn, instance_id, path, hash, side).await?;
        Ok::<_, VaultError>(displaced)
    }
    .await;

    finish_txn(txn, outcome).await
}
