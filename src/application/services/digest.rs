//! Staleness detection — decide whether a container's image has a newer
//! version available, preferring a cheap remote metadata probe over a pull.

use anyhow::{Context, Result};
use tracing::debug;

use crate::application::ports::{ImageStore, RegistryClient};
use crate::domain::ImageRef;

/// Outcome of one staleness check.
#[derive(Debug, Clone, Default)]
pub struct CheckResult {
    /// Whether an update is needed.
    pub needs_update: bool,
    /// Digest (or image ID fallback) of the local image, when resolvable.
    pub local_digest: Option<String>,
    /// Digest the registry currently serves, when obtained via metadata.
    pub remote_digest: Option<String>,
    /// `true` when the verdict came from registry metadata; `false` means
    /// the caller must fall back to pulling and comparing image identity.
    pub checked_via_api: bool,
    /// Error encountered while resolving metadata, if any.
    pub error: Option<String>,
}

/// Check whether `image_ref` has newer content available.
///
/// The local digest is read from the image's recorded repo-digests (falling
/// back to the content-addressed image ID); the remote digest comes from a
/// manifest metadata probe. A missing local image is conclusive: an update
/// (pull) is required. A failed remote probe is not — the result carries
/// `checked_via_api = false` and the caller falls back to
/// [`compare_with_pulled`].
pub async fn check_needs_update(
    images: &impl ImageStore,
    registry: &impl RegistryClient,
    image_ref: &str,
    auth_token: Option<&str>,
) -> CheckResult {
    let parsed = ImageRef::parse(image_ref);

    let local = match images.inspect_image(image_ref).await {
        Ok(inspect) => inspect,
        Err(err) => {
            // Image absent locally: a pull is required, no probe needed.
            return CheckResult {
                needs_update: true,
                error: Some(format!("image not present locally: {err:#}")),
                ..Default::default()
            };
        }
    };
    let local_digest = local_digest(&local, image_ref);

    match registry.remote_digest(&parsed, auth_token).await {
        Ok(remote) => {
            let needs_update = local_digest.as_deref() != Some(remote.as_str());
            CheckResult {
                needs_update,
                local_digest,
                remote_digest: Some(remote),
                checked_via_api: true,
                error: None,
            }
        }
        Err(err) => {
            debug!(image = %image_ref, error = %format!("{err:#}"), "remote digest probe failed");
            CheckResult {
                needs_update: false,
                local_digest,
                remote_digest: None,
                checked_via_api: false,
                error: Some(format!("{err:#}")),
            }
        }
    }
}

/// Fallback comparison after a pull: inspect the freshly-pulled reference and
/// compare its content-addressed ID against the image the container was
/// running. `true` means the tag now points at different content.
///
/// # Errors
///
/// Returns an error if the pulled image cannot be inspected.
pub async fn compare_with_pulled(
    images: &impl ImageStore,
    old_image_id: &str,
    new_image_ref: &str,
) -> Result<bool> {
    let inspect = images
        .inspect_image(new_image_ref)
        .await
        .with_context(|| format!("inspecting pulled image {new_image_ref}"))?;
    let new_id = inspect.id.unwrap_or_default();
    Ok(!new_id.is_empty() && new_id != old_image_id)
}

/// Resolve the local digest for `image_ref` from its repo-digests: the first
/// `@sha256:` entry naming the same repository wins; otherwise fall back to
/// the image's own content-addressed ID.
///
/// Repo-digest entries carry no tag (`registry/repo@sha256:…`), so the match
/// is on the (registry, repository) pair only.
fn local_digest(inspect: &bollard::models::ImageInspect, image_ref: &str) -> Option<String> {
    let wanted = ImageRef::parse(image_ref);
    if let Some(repo_digests) = &inspect.repo_digests {
        for entry in repo_digests {
            let Some((name, digest)) = entry.split_once('@') else {
                continue;
            };
            let candidate = ImageRef::parse(name);
            if entry.contains("@sha256:")
                && candidate.canonical_registry() == wanted.canonical_registry()
                && candidate.repository.eq_ignore_ascii_case(&wanted.repository)
            {
                return Some(digest.to_owned());
            }
        }
    }
    inspect.id.clone()
}
