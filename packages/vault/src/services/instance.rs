use std::collections::{HashMap, HashSet};

use sea_orm::{
    ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait,
};
use tracing::{info, instrument};

use super::{finish_txn, require_instance};
use crate::entity::{association, instance};
use crate::error::VaultError;
use crate::gc::sweep_orphans_among;
use crate::index;
use crate::models::instance::validate_paging;
use crate::models::{DeleteInstanceReport, InstanceSummary, PaginatedInstances};
use crate::state::VaultState;
use crate::utils::validate_instance_id;

/// Remove an instance and every association it owns, then reclaim content
/// no other instance uses.
#[instrument(skip(state))]
pub async fn delete_instance(
    state: &VaultState,
    instance_id: &str,
) -> Result<DeleteInstanceReport, VaultError> {
    validate_instance_id(instance_id)?;
    let _guard = state.locks.lock(instance_id).await;

    let txn = state.db.begin().await?;
    let outcome = async {
        require_instance(&txn, instance_id).await?;
        let held: HashSet<String> = index::list_for_instance(&txn, instance_id)
            .await?
            .into_iter()
            .map(|a| a.content_hash)
            .collect();
        let removed = index::replace_all(&txn, instance_id).await?;
        instance::Entity::delete_by_id(instance_id.to_string())
            .exec(&txn)
            .await?;
        Ok::<_, VaultError>((removed, held))
    }
    .await;
    let (removed, held) = finish_txn(txn, outcome).await?;

    let sweep = sweep_orphans_among(state, &held).await;
    info!(
        files = removed,
        orphans_reaped = sweep.objects_reaped,
        bytes_freed = sweep.bytes_freed,
        "Instance deleted"
    );

    Ok(DeleteInstanceReport {
        orphan_objects_reaped: sweep.objects_reaped,
        bytes_freed: sweep.bytes_freed,
    })
}

/// One page of instances, most recently updated first.
#[instrument(skip(state))]
pub async fn list_instances(
    state: &VaultState,
    page: u64,
    page_size: u64,
) -> Result<PaginatedInstances, VaultError> {
    validate_paging(page, page_size)?;

    let paginator = instance::Entity::find()
        .order_by_desc(instance::Column::UpdatedAt)
        .order_by_asc(instance::Column::Id)
        .paginate(&state.db, page_size);
    let total = paginator.num_items().await?;
    let instances = paginator.fetch_page(page - 1).await?;

    let ids: Vec<String> = instances.iter().map(|i| i.id.clone()).collect();
    let counts: HashMap<String, i64> = if ids.is_empty() {
        HashMap::new()
    } else {
        association::Entity::find()
            .select_only()
            .column(association::Column::InstanceId)
            .column_as(association::Column::Id.count(), "files_count")
            .filter(association::Column::InstanceId.is_in(ids))
            .group_by(association::Column::InstanceId)
            .into_tuple::<(String, i64)>()
            .all(&state.db)
            .await?
            .into_iter()
            .collect()
    };

    let items = instances
        .into_iter()
        .map(|i| InstanceSummary {
            files_count: counts.get(&i.id).copied().unwrap_or(0).max(0) as u64,
            id: i.id,
            title: i.title,
            mc_version: i.mc_version,
            loader: i.loader,
            loader_version: i.loader_version,
        })
        .collect();

    Ok(PaginatedInstances {
        items,
        total,
        page,
        page_size,
        pages: total.div_ceil(page_size),
    })
}
