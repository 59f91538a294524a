//! Instance-to-content associations keyed by (instance id, install path).
//!
//! Every function takes any `ConnectionTrait` so callers compose them inside
//! one transaction. None of them touch the blob store; deletions leave
//! orphan detection to [`crate::gc`].

use std::collections::HashSet;

use chrono::Utc;
use common::Side;
use common::storage::ContentHash;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::entity::association;
use crate::error::VaultError;

pub async fn find_by_path<C: ConnectionTrait>(
    db: &C,
    instance_id: &str,
    path: &str,
) -> Result<Option<association::Model>, DbErr> {
    association::Entity::find()
        .filter(association::Column::InstanceId.eq(instance_id))
        .filter(association::Column::Path.eq(path))
        .one(db)
        .await
}

/// All associations of an instance, ordered by install path.
pub async fn list_for_instance<C: ConnectionTrait>(
    db: &C,
    instance_id: &str,
) -> Result<Vec<association::Model>, DbErr> {
    association::Entity::find()
        .filter(association::Column::InstanceId.eq(instance_id))
        .order_by_asc(association::Column::Path)
        .all(db)
        .await
}

/// Remove every association of an instance ahead of a full re-upload.
///
/// Returns the number of associations removed.
pub async fn replace_all<C: ConnectionTrait>(db: &C, instance_id: &str) -> Result<u64, DbErr> {
    let result = association::Entity::delete_many()
        .filter(association::Column::InstanceId.eq(instance_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Point `path` at `hash`, replacing whatever was there.
///
/// Returns the new association and the hash it displaced, if any.
pub async fn upsert_by_path<C: ConnectionTrait>(
    db: &C,
    instance_id: &str,
    path: &str,
    hash: &ContentHash,
    side: Side,
) -> Result<(association::Model, Option<String>), DbErr> {
    let previous = find_by_path(db, instance_id, path).await?;
    if let Some(previous) = &previous {
        association::Entity::delete_by_id(previous.id).exec(db).await?;
    }

    let model = association::ActiveModel {
        id: Set(Uuid::now_v7()),
        instance_id: Set(instance_id.to_string()),
        path: Set(path.to_string()),
        content_hash: Set(hash.to_hex()),
        side: Set(side),
        created_at: Set(Utc::now()),
    };
    let inserted = model.insert(db).await?;

    Ok((inserted, previous.map(|p| p.content_hash)))
}

/// Change only the side tag of an existing association.
pub async fn set_side<C: ConnectionTrait>(
    db: &C,
    instance_id: &str,
    path: &str,
    side: Side,
) -> Result<association::Model, VaultError> {
    let existing = find_by_path(db, instance_id, path)
        .await?
        .ok_or_else(|| VaultError::NotFound(format!("file '{path}' in instance '{instance_id}'")))?;

    if existing.side == side {
        return Ok(existing);
    }

    let mut model: association::ActiveModel = existing.into();
    model.side = Set(side);
    Ok(model.update(db).await?)
}

pub async fn delete_by_path<C: ConnectionTrait>(
    db: &C,
    instance_id: &str,
    path: &str,
) -> Result<association::Model, VaultError> {
    let existing = find_by_path(db, instance_id, path)
        .await?
        .ok_or_else(|| VaultError::NotFound(format!("file '{path}' in instance '{instance_id}'")))?;

    association::Entity::delete_by_id(existing.id).exec(db).await?;
    Ok(existing)
}

/// Re-key the association at `from` to `to`. An occupant at `to` is replaced.
///
/// Returns the moved association and the hash of the replaced occupant.
pub async fn move_path<C: ConnectionTrait>(
    db: &C,
    instance_id: &str,
    from: &str,
    to: &str,
) -> Result<(association::Model, Option<String>), VaultError> {
    let existing = find_by_path(db, instance_id, from)
        .await?
        .ok_or_else(|| VaultError::NotFound(format!("file '{from}' in instance '{instance_id}'")))?;

    if from == to {
        return Ok((existing, None));
    }

    let occupant = find_by_path(db, instance_id, to).await?;
    if let Some(occupant) = &occupant {
        association::Entity::delete_by_id(occupant.id).exec(db).await?;
    }

    let mut model: association::ActiveModel = existing.into();
    model.path = Set(to.to_string());
    let moved = model.update(db).await?;

    Ok((moved, occupant.map(|o| o.content_hash)))
}

/// Every hash referenced by at least one association.
pub async fn referenced_hashes<C: ConnectionTrait>(db: &C) -> Result<HashSet<String>, DbErr> {
    let hashes: Vec<String> = association::Entity::find()
        .select_only()
        .column(association::Column::ContentHash)
        .distinct()
        .into_tuple()
        .all(db)
        .await?;
    Ok(hashes.into_iter().collect())
}

/// The subset of `hashes` still referenced by some association.
pub async fn referenced_among<C: ConnectionTrait>(
    db: &C,
    hashes: &[String],
) -> Result<HashSet<String>, DbErr> {
    if hashes.is_empty() {
        return Ok(HashSet::new());
    }

    let live: Vec<String> = association::Entity::find()
        .select_only()
        .column(association::Column::ContentHash)
        .filter(association::Column::ContentHash.is_in(hashes.iter().cloned()))
        .distinct()
        .into_tuple()
        .all(db)
        .await?;
    Ok(live.into_iter().collect())
}

pub async fn count_references<C: ConnectionTrait>(db: &C, hash: &str) -> Result<u64, DbErr> {
    association::Entity::find()
        .filter(association::Column::ContentHash.eq(hash))
        .count(db)
        .await
}
