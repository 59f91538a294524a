use bytes::Bytes;
use chrono::Utc;
use common::storage::ContentHash;
use futures::Stream;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DbErr, EntityTrait, Set, TransactionTrait};
use tracing::{Span, error, info, instrument};

use super::{compensate, finish_txn, store_content};
use crate::archive::{ExtractionStats, ValidatedArchive, extract_entries, validate_upload};
use crate::entity::instance;
use crate::error::VaultError;
use crate::gc::sweep_orphans;
use crate::index;
use crate::models::{BundleMeta, IngestReport};
use crate::state::VaultState;
use crate::utils::{generate_instance_id, validate_instance_id};

/// Accept a bundle upload as the full new content of its instance.
///
/// The instance id is derived from the title and game version. An existing
/// instance with that id has all of its files replaced. Nothing is written
/// unless the archive passes validation; a failure after that rolls the
/// metadata back and removes the blobs this upload created.
#[instrument(skip(state, upload, meta), fields(title = %meta.title, instance_id = tracing::field::Empty))]
pub async fn ingest_bundle<S, E>(
    state: &VaultState,
    upload: S,
    meta: BundleMeta,
) -> Result<IngestReport, VaultError>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    let instance_id = generate_instance_id(&meta.title, &meta.mc_version);
    validate_instance_id(&instance_id)?;
    Span::current().record("instance_id", instance_id.as_str());

    let archive = validate_upload(upload, &state.config.archive).await?;
    info!(
        kind = %archive.kind,
        files = archive.summary.file_count,
        total_uncompressed = archive.summary.total_uncompressed,
        "Ingesting bundle"
    );

    let _guard = state.locks.lock(&instance_id).await;

    let mut created = Vec::new();
    let result = {
        let _gate = state.reap_gate.read().await;
        write_bundle(state, &instance_id, &meta, archive, &mut created).await
    };

    match result {
        Ok(report) => {
            let sweep = sweep_orphans(state).await;
            info!(
                new_objects = report.new_object_count,
                deduped = report.deduped_count,
                skipped = report.skipped_entries,
                orphans_reaped = sweep.objects_reaped,
                "Bundle ingested"
            );
            Ok(report)
        }
        Err(e) => {
            error!(error = %e, created = created.len(), "Bundle ingestion failed, rolling back");
            compensate(state, &created).await;
            Err(e)
        }
    }
}

async fn write_bundle(
    state: &VaultState,
    instance_id: &str,
    meta: &BundleMeta,
    archive: ValidatedArchive,
    created: &mut Vec<ContentHash>,
) -> Result<IngestReport, VaultError> {
    let txn = state.db.begin().await?;
    let outcome = fill_instance(&txn, state, instance_id, meta, archive, created).await;
    finish_txn(txn, outcome).await
}

async fn fill_instance<C: ConnectionTrait>(
    db: &C,
    state: &VaultState,
    instance_id: &str,
    meta: &BundleMeta,
    archive: ValidatedArchive,
    created: &mut Vec<ContentHash>,
) -> Result<IngestReport, VaultError> {
    upsert_instance(db, instance_id, meta).await?;
    let replaced = index::replace_all(db, instance_id).await?;
    if replaced > 0 {
        info!(replaced, "Replacing existing instance files");
    }

    let (mut entries, extractor) = extract_entries(
        archive,
        state.config.archive.clone(),
        state.config.sides.clone(),
    );

    let mut report = IngestReport {
        instance_id: instance_id.to_string(),
        new_object_count: 0,
        deduped_count: 0,
        skipped_entries: 0,
    };

    let mut stored = Ok(());
    while let Some(entry) = entries.recv().await {
        let step = async {
            let is_new = store_content(
                db,
                state,
                &entry.hash,
                &entry.filename,
                entry.data.clone(),
                created,
            )
            .await?;
            index::upsert_by_path(db, instance_id, &entry.install_path, &entry.hash, entry.side)
                .await?;
            Ok::<_, VaultError>(is_new)
        };

        match step.await {
            Ok(true) => report.new_object_count += 1,
            Ok(false) => report.deduped_count += 1,
            Err(e) => {
                stored = Err(e);
                break;
            }
        }
    }

    // Closing the channel stops an extractor that is still running.
    drop(entries);
    let extraction: Result<ExtractionStats, VaultError> = extractor.await?;
    stored?;
    let stats = extraction?;

    report.skipped_entries = stats.skipped() as u64;
    Ok(report)
}

async fn upsert_instance<C: ConnectionTrait>(
    db: &C,
    instance_id: &str,
    meta: &BundleMeta,
) -> Result<instance::Model, DbErr> {
    let now = Utc::now();

    match instance::Entity::find_by_id(instance_id.to_string())
        .one(db)
        .await?
    {
        Some(existing) => {
            let mut model: instance::ActiveModel = existing.into();
            model.title = Set(meta.title.clone());
            model.mc_version = Set(meta.mc_version.clone());
            model.loader = Set(meta.loader);
            model.loader_version = Set(meta.loader_version.clone());
            model.updated_at = Set(now);
            model.update(db).await
        }
        None => {
            let model = instance::ActiveModel {
                id: Set(instance_id.to_string()),
                title: Set(meta.title.clone()),
                mc_version: Set(meta.mc_version.clone()),
                loader: Set(meta.loader),
                loader_version: Set(meta.loader_version.clone()),
                created_at: Set(now),
                updated_at: Set(now),
            };
            model.insert(db).await
        }
    }
}
