//! Self-update coordination — replacing the orchestrator's own container.
//!
//! The running instance cannot be swapped in place, so replacement is a
//! rename-then-replace dance: rename the running container to a temporary
//! name (freeing the original name), create the replacement under the
//! original name, and clean up abandoned renamed instances on a later
//! startup. The rename must be committed in the runtime before anything is
//! created under the freed name.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use rand::RngCore;
use rand::rngs::OsRng;
use tracing::{info, warn};

use crate::application::ports::{ContainerInspector, ContainerLifecycle};
use crate::domain::SelfUpdateError;
use crate::domain::labels::{self, ControlLabel};

/// Prefix of temporary names given to instances awaiting replacement.
pub const TEMP_NAME_PREFIX: &str = "arcane-updater-old-";

/// Random suffix length appended to [`TEMP_NAME_PREFIX`].
pub const TEMP_SUFFIX_LEN: usize = 8;

/// Grace period when stopping abandoned instances during cleanup.
pub const CLEANUP_STOP_GRACE: Duration = Duration::from_secs(30);

const SUFFIX_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a Docker-name-safe temporary name: the fixed prefix plus 8
/// lowercase-alphanumeric characters from the OS random source, with a
/// time-derived suffix only if secure randomness is unavailable.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn generate_temp_name() -> String {
    let mut bytes = [0u8; TEMP_SUFFIX_LEN];
    if OsRng.try_fill_bytes(&mut bytes).is_err() {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = ((nanos >> (i * 8)) & 0xff) as u8;
        }
    }
    let suffix: String = bytes
        .iter()
        .map(|b| SUFFIX_CHARSET[usize::from(*b) % SUFFIX_CHARSET.len()] as char)
        .collect();
    format!("{TEMP_NAME_PREFIX}{suffix}")
}

/// Whether the given container is an instance of the orchestrator itself.
///
/// # Errors
///
/// Returns an error if the container cannot be inspected.
pub async fn is_self(inspector: &impl ContainerInspector, container_id: &str) -> Result<bool> {
    let resp = inspector
        .inspect_container(container_id)
        .await
        .with_context(|| format!("inspecting container {container_id}"))?;
    let labels = resp
        .config
        .and_then(|c| c.labels)
        .unwrap_or_default();
    Ok(labels::is_managed_by_arcane(&labels))
}

/// Rename the running instance out of the way, freeing `original_name` for
/// the replacement. Returns the temporary name.
///
/// The rename is verified against the runtime before returning, so callers
/// may create the replacement under `original_name` as soon as this
/// resolves. Must be called before any replacement container is created.
///
/// # Errors
///
/// Returns [`SelfUpdateError::RenameFailed`] when the rename is rejected and
/// [`SelfUpdateError::RenameNotVisible`] when the runtime does not report it
/// as committed; either is fatal for this update attempt and nothing
/// destructive has happened to the original container.
pub async fn prepare_for_self_update(
    runtime: &(impl ContainerInspector + ContainerLifecycle),
    container_id: &str,
    original_name: &str,
) -> Result<String> {
    let temp_name = generate_temp_name();

    runtime
        .rename_container(container_id, &temp_name)
        .await
        .map_err(|err| SelfUpdateError::RenameFailed {
            name: original_name.to_owned(),
            temp_name: temp_name.clone(),
            reason: format!("{err:#}"),
        })?;

    // The freed name is only usable once the runtime reports the rename.
    let resp = runtime
        .inspect_container(container_id)
        .await
        .with_context(|| format!("verifying rename of {container_id}"))?;
    let current = resp
        .name
        .as_deref()
        .map(|n| n.trim_start_matches('/').to_owned())
        .unwrap_or_default();
    if current != temp_name {
        return Err(SelfUpdateError::RenameNotVisible {
            name: original_name.to_owned(),
            temp_name,
        }
        .into());
    }

    info!(
        container = %container_id,
        from = %original_name,
        to = %temp_name,
        "renamed running instance for self-update"
    );
    Ok(temp_name)
}

/// Remove abandoned instances left behind by interrupted self-updates.
///
/// Lists all containers carrying the manager label, keeps only those whose
/// current name still carries the temporary-name prefix (legitimately
/// multi-instance deployments were never renamed and are excluded), sorts
/// newest-first, optionally skips the single newest (a fresh instance may
/// still be starting), then stops and force-removes the rest. Failures for
/// one instance are logged and do not abort cleanup of the others.
///
/// Returns the IDs of removed instances.
///
/// # Errors
///
/// Returns an error only if the instance listing itself fails.
pub async fn cleanup_old_instances(
    runtime: &(impl ContainerInspector + ContainerLifecycle),
    keep_newest: bool,
) -> Result<Vec<String>> {
    // Filter on label presence; the truthy set is wider than `=true`.
    let filters: HashMap<String, Vec<String>> = [(
        "label".to_owned(),
        vec![ControlLabel::Manager.key().to_owned()],
    )]
    .into_iter()
    .collect();

    let mut stale: Vec<_> = runtime
        .list_containers(filters, true)
        .await
        .context("listing manager instances")?
        .into_iter()
        .filter(|c| {
            labels::is_managed_by_arcane(c.labels.as_ref().unwrap_or(&HashMap::new()))
        })
        .filter(|c| {
            c.names
                .as_ref()
                .and_then(|names| names.first())
                .map(|n| n.trim_start_matches('/'))
                .is_some_and(|n| n.starts_with(TEMP_NAME_PREFIX))
        })
        .collect();
    stale.sort_by_key(|c| std::cmp::Reverse(c.created.unwrap_or(0)));

    let skip = usize::from(keep_newest);
    let mut removed = Vec::new();
    for instance in stale.into_iter().skip(skip) {
        let Some(id) = instance.id else { continue };
        // Stop errors are expected for already-exited instances.
        if let Err(err) = runtime
            .stop_container(&id, CLEANUP_STOP_GRACE, None)
            .await
        {
            warn!(container = %id, error = %format!("{err:#}"), "stop during cleanup failed");
        }
        match runtime.remove_container(&id, true).await {
            Ok(()) => {
                info!(container = %id, "removed abandoned updater instance");
                removed.push(id);
            }
            Err(err) => {
                warn!(container = %id, error = %format!("{err:#}"), "remove during cleanup failed");
            }
        }
    }
    Ok(removed)
}

/// The currently running manager instance, newest by creation time, if any.
///
/// # Errors
///
/// Returns an error if the listing fails.
pub async fn current_instance(
    inspector: &impl ContainerInspector,
) -> Result<Option<bollard::models::ContainerSummary>> {
    let filters: HashMap<String, Vec<String>> = [
        (
            "label".to_owned(),
            vec![ControlLabel::Manager.key().to_owned()],
        ),
        ("status".to_owned(), vec!["running".to_owned()]),
    ]
    .into_iter()
    .collect();

    let mut instances: Vec<_> = inspector
        .list_containers(filters, false)
        .await
        .context("listing running manager instances")?
        .into_iter()
        .filter(|c| {
            labels::is_managed_by_arcane(c.labels.as_ref().unwrap_or(&HashMap::new()))
        })
        .collect();
    instances.sort_by_key(|c| std::cmp::Reverse(c.created.unwrap_or(0)));
    Ok(instances.into_iter().next())
}
