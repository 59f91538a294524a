use tracing::{instrument, warn};

use super::{load_contents, require_instance};
use crate::error::VaultError;
use crate::index;
use crate::models::{Manifest, ManifestFile};
use crate::state::VaultState;
use crate::utils::validate_instance_id;

/// Join a base URL and a blob locator with exactly one `/`.
pub fn download_url(base: &str, locator: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        locator.trim_start_matches('/')
    )
}

/// Everything a client needs to install an instance. Server-only files are
/// left out.
#[instrument(skip(state))]
pub async fn build_manifest(state: &VaultState, instance_id: &str) -> Result<Manifest, VaultError> {
    validate_instance_id(instance_id)?;
    let instance = require_instance(&state.db, instance_id).await?;

    let associations: Vec<_> = index::list_for_instance(&state.db, instance_id)
        .await?
        .into_iter()
        .filter(|a| a.side.is_client_visible())
        .collect();
    let contents = load_contents(
        &state.db,
        associations.iter().map(|a| a.content_hash.clone()),
    )
    .await?;

    let base = &state.config.manifest.download_base_url;
    let mut files = Vec::with_capacity(associations.len());
    for association in associations {
        let Some(content) = contents.get(&association.content_hash) else {
            warn!(path = %association.path, hash = %association.content_hash, "Association without content object");
            continue;
        };
        files.push(ManifestFile {
            filename: content.filename.clone(),
            size: content.size.max(0) as u64,
            download_url: download_url(base, &content.locator),
            install_path: association.path,
            hash: association.content_hash,
        });
    }

    Ok(Manifest {
        instance_id: instance.id,
        mc_version: instance.mc_version,
        loader: instance.loader,
        loader_version: instance.loader_version,
        files,
    })
}
