//! One update orchestration pass.
//!
//! Sequences the other services: label policy filters the candidate set,
//! the digest checker decides staleness, the dependency graph sorter fixes
//! the recreation order, and each recreation is bracketed by lifecycle
//! hooks — routing through the self-update coordinator when the target is
//! the manager's own container.
//!
//! The pass is sequential across the sorted order: two containers connected
//! by a dependency edge are never recreated concurrently, and the sorter's
//! output is the sole authority for sequencing. The unit of consistency is
//! a single pass; partial completion is recoverable and the next pass
//! re-evaluates from scratch.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::ports::{ContainerInspector, ContainerRuntime, ImageStore, RegistryClient};
use crate::application::services::digest::{self, CheckResult};
use crate::application::services::hooks;
use crate::application::services::self_update;
use crate::domain::{DependencyGraph, LifecycleHook, ManagedContainer, labels, propagate_restarts};

/// Default grace period when stopping a container for recreation.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(10);

// ── Pass types ────────────────────────────────────────────────────────────────

/// Pass-level knobs supplied by the driver.
#[derive(Debug, Clone)]
pub struct PassOptions {
    /// Bearer token for registry metadata probes and pulls.
    pub auth_token: Option<String>,
    /// Grace period for stopping containers before recreation.
    pub stop_grace: Duration,
}

impl Default for PassOptions {
    fn default() -> Self {
        Self {
            auth_token: None,
            stop_grace: DEFAULT_STOP_GRACE,
        }
    }
}

/// Per-container outcome of a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ContainerOutcome {
    /// Recreated from a newer image (or restarted for a dependency).
    Updated,
    /// No update needed; container untouched.
    Unchanged,
    /// Left out of this pass; the reason says why (label opt-out, hook skip
    /// sentinel, cancellation).
    Skipped { reason: String },
    /// Update attempted or required but not completed.
    Failed { reason: String },
}

/// One container's line in the pass report.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerReport {
    pub name: String,
    #[serde(flatten)]
    pub outcome: ContainerOutcome,
}

/// Result of one orchestration pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PassReport {
    pub containers: Vec<ContainerReport>,
    /// Pass-level error (dependency cycle); set means no container in the
    /// affected set was updated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PassReport {
    fn record(&mut self, name: &str, outcome: ContainerOutcome) {
        self.containers.push(ContainerReport {
            name: name.to_owned(),
            outcome,
        });
    }
}

/// Staleness report for the `check` command — no recreation performed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckReport {
    pub images: Vec<ImageCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One container's staleness line.
#[derive(Debug, Clone, Serialize)]
pub struct ImageCheck {
    pub name: String,
    pub image: String,
    pub needs_update: bool,
    pub checked_via_api: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ── Candidate discovery ───────────────────────────────────────────────────────

/// Snapshot every running container into the candidate set for a pass.
///
/// # Errors
///
/// Returns an error if listing or inspecting containers fails.
pub async fn discover_candidates(
    inspector: &impl ContainerInspector,
) -> Result<Vec<ManagedContainer>> {
    let filters: HashMap<String, Vec<String>> =
        [("status".to_owned(), vec!["running".to_owned()])]
            .into_iter()
            .collect();
    let summaries = inspector
        .list_containers(filters, false)
        .await
        .context("listing running containers")?;

    let mut candidates = Vec::with_capacity(summaries.len());
    for summary in summaries {
        let Some(id) = summary.id else { continue };
        let resp = inspector
            .inspect_container(&id)
            .await
            .with_context(|| format!("inspecting container {id}"))?;
        candidates.push(ManagedContainer::from_inspect(&resp));
    }
    Ok(candidates)
}

// ── Pass execution ────────────────────────────────────────────────────────────

/// Run one orchestration pass over `candidates`.
///
/// Every candidate gets an individual outcome; a dependency cycle aborts the
/// pass with a top-level error and no recreations. Once cancellation is
/// observed the pass stops advancing and the remaining containers are left
/// untouched for the next pass.
pub async fn run_pass(
    runtime: &impl ContainerRuntime,
    registry: &impl RegistryClient,
    mut candidates: Vec<ManagedContainer>,
    opts: &PassOptions,
    cancel: &CancellationToken,
) -> PassReport {
    let mut report = PassReport::default();
    let mut decided: HashSet<String> = HashSet::new();
    let mut checks: HashMap<String, CheckResult> = HashMap::new();
    // Keyed by name, full ID and short ID so network-namespace references in
    // either form resolve during propagation.
    let mut marked: HashSet<String> = HashSet::new();

    // Policy filter, check hooks, and staleness per candidate.
    for container in &candidates {
        let name = container.name.clone();

        if labels::is_update_disabled(&container.labels) {
            debug!(container = %name, "updates disabled by label");
            report.record(&name, ContainerOutcome::Skipped {
                reason: "updates disabled by label".to_owned(),
            });
            decided.insert(name);
            continue;
        }
        if cancel.is_cancelled() {
            report.record(&name, ContainerOutcome::Skipped {
                reason: "pass cancelled".to_owned(),
            });
            decided.insert(name);
            continue;
        }

        let pre = hooks::run_hook(
            runtime,
            LifecycleHook::PreCheck,
            &container.id,
            &container.labels,
            cancel,
        )
        .await;
        if let Some(err) = pre.error {
            report.record(&name, ContainerOutcome::Failed {
                reason: format!("pre-check hook failed: {err}"),
            });
            decided.insert(name);
            continue;
        }
        if pre.skip_update {
            report.record(&name, ContainerOutcome::Skipped {
                reason: "skip requested by pre-check hook".to_owned(),
            });
            decided.insert(name);
            continue;
        }

        let mut check = digest::check_needs_update(
            runtime,
            registry,
            &container.image_ref,
            opts.auth_token.as_deref(),
        )
        .await;

        // Remote metadata unreachable: recover locally by pulling and
        // comparing image identity. Never a pass failure.
        if !check.checked_via_api && !check.needs_update && check.error.is_some() {
            match pull_and_compare(runtime, container, opts).await {
                Ok(stale) => check.needs_update = stale,
                Err(err) => {
                    report.record(&name, ContainerOutcome::Failed {
                        reason: format!("staleness check fallback failed: {err:#}"),
                    });
                    decided.insert(name);
                    continue;
                }
            }
        }

        let post = hooks::run_hook(
            runtime,
            LifecycleHook::PostCheck,
            &container.id,
            &container.labels,
            cancel,
        )
        .await;
        if let Some(err) = post.error {
            // The check already happened; a failing post-check hook is
            // advisory and must not block the container's update.
            warn!(container = %name, error = %err, "post-check hook failed");
        }
        if post.skip_update {
            report.record(&name, ContainerOutcome::Skipped {
                reason: "skip requested by post-check hook".to_owned(),
            });
            decided.insert(name);
            continue;
        }

        if check.needs_update {
            info!(container = %name, image = %container.image_ref, "update available");
            marked.insert(container.name.clone());
            marked.insert(container.id.clone());
            marked.insert(container.short_id.clone());
        }
        checks.insert(name, check);
    }

    // Single-hop propagation, repeated until a fixed point, so multi-level
    // chains fully cascade.
    loop {
        let newly = propagate_restarts(&mut candidates, &marked);
        if newly.is_empty() {
            break;
        }
        for name in newly {
            if let Some(c) = candidates.iter().find(|c| c.name == name) {
                marked.insert(c.id.clone());
                marked.insert(c.short_id.clone());
            }
            debug!(container = %name, "marked for restart via dependency");
            marked.insert(name);
        }
    }

    // Recreation order. A cycle anywhere aborts the pass with no recreations.
    let order = match DependencyGraph::build(&candidates).sort() {
        Ok(order) => order,
        Err(cycle) => {
            report.error = Some(cycle.to_string());
            return report;
        }
    };

    // Sequential walk: the sorted order is the sole sequencing authority.
    for container in &order {
        if decided.contains(&container.name) {
            continue;
        }
        if !marked.contains(&container.name) {
            report.record(&container.name, ContainerOutcome::Unchanged);
            continue;
        }
        if cancel.is_cancelled() {
            report.record(&container.name, ContainerOutcome::Skipped {
                reason: "pass cancelled".to_owned(),
            });
            continue;
        }

        let stale_image = checks
            .get(&container.name)
            .is_some_and(|check| check.needs_update);
        // The snapshot label picks the route; the rename dance additionally
        // requires live confirmation, since the container may have been
        // recreated without the manager label after discovery.
        let outcome = if labels::is_managed_by_arcane(&container.labels) {
            match self_update::is_self(runtime, &container.id).await {
                Ok(true) => update_self(runtime, container, stale_image, opts, cancel).await,
                Ok(false) => {
                    update_container(runtime, container, stale_image, opts, cancel).await
                }
                Err(err) => ContainerOutcome::Failed {
                    reason: format!("confirming manager identity: {err:#}"),
                },
            }
        } else {
            update_container(runtime, container, stale_image, opts, cancel).await
        };
        report.record(&container.name, outcome);
    }

    report
}

/// Report-only pass: staleness checks plus a sort to surface cycles early.
pub async fn check_pass(
    images: &impl ImageStore,
    registry: &impl RegistryClient,
    candidates: &[ManagedContainer],
    opts: &PassOptions,
) -> CheckReport {
    let mut report = CheckReport::default();

    for container in candidates {
        if labels::is_update_disabled(&container.labels) {
            continue;
        }
        let check = digest::check_needs_update(
            images,
            registry,
            &container.image_ref,
            opts.auth_token.as_deref(),
        )
        .await;
        report.images.push(ImageCheck {
            name: container.name.clone(),
            image: container.image_ref.clone(),
            needs_update: check.needs_update,
            checked_via_api: check.checked_via_api,
            local_digest: check.local_digest,
            remote_digest: check.remote_digest,
            error: check.error,
        });
    }

    if let Err(cycle) = DependencyGraph::build(candidates).sort() {
        report.error = Some(cycle.to_string());
    }
    report
}

// ── Per-container update paths ────────────────────────────────────────────────

async fn update_container(
    runtime: &impl ContainerRuntime,
    container: &ManagedContainer,
    stale_image: bool,
    opts: &PassOptions,
    cancel: &CancellationToken,
) -> ContainerOutcome {
    let pre = hooks::run_hook(
        runtime,
        LifecycleHook::PreUpdate,
        &container.id,
        &container.labels,
        cancel,
    )
    .await;
    // A failed pre-update hook means no destructive action on this container.
    if let Some(err) = pre.error {
        return ContainerOutcome::Failed {
            reason: format!("pre-update hook failed: {err}"),
        };
    }
    if pre.skip_update {
        return ContainerOutcome::Skipped {
            reason: "skip requested by pre-update hook".to_owned(),
        };
    }

    // Implicit restarts reuse the local image; stale images are pulled before
    // the old container is stopped.
    if stale_image {
        if let Err(err) = runtime
            .pull_image(&container.image_ref, opts.auth_token.as_deref())
            .await
        {
            return ContainerOutcome::Failed {
                reason: format!("pulling {}: {err:#}", container.image_ref),
            };
        }
    }

    let signal = labels::stop_signal(&container.labels);
    if let Err(err) = runtime
        .stop_container(&container.id, opts.stop_grace, signal.as_deref())
        .await
    {
        return ContainerOutcome::Failed {
            reason: format!("stopping container: {err:#}"),
        };
    }
    if let Err(err) = runtime.remove_container(&container.id, true).await {
        return ContainerOutcome::Failed {
            reason: format!("removing container: {err:#}"),
        };
    }

    let config = container.recreate_config(&container.image_ref);
    let new_id = match runtime.create_container(&container.name, config).await {
        Ok(id) => id,
        Err(err) => {
            return ContainerOutcome::Failed {
                reason: format!("recreating container: {err:#}"),
            };
        }
    };
    if let Err(err) = runtime.start_container(&new_id).await {
        return ContainerOutcome::Failed {
            reason: format!("starting replacement container: {err:#}"),
        };
    }
    info!(container = %container.name, "container updated");

    let post = hooks::run_hook(
        runtime,
        LifecycleHook::PostUpdate,
        &new_id,
        &container.labels,
        cancel,
    )
    .await;
    if let Some(err) = post.error {
        // The replacement is running; report the hook failure per-container.
        return ContainerOutcome::Failed {
            reason: format!("updated, but post-update hook failed: {err}"),
        };
    }

    ContainerOutcome::Updated
}

/// Replace the manager's own container: rename the running instance first so
/// the replacement can take the original name, then create and start it. The
/// renamed instance keeps running and is cleaned up on the next startup.
async fn update_self(
    runtime: &impl ContainerRuntime,
    container: &ManagedContainer,
    stale_image: bool,
    opts: &PassOptions,
    cancel: &CancellationToken,
) -> ContainerOutcome {
    let pre = hooks::run_hook(
        runtime,
        LifecycleHook::PreUpdate,
        &container.id,
        &container.labels,
        cancel,
    )
    .await;
    if let Some(err) = pre.error {
        return ContainerOutcome::Failed {
            reason: format!("pre-update hook failed: {err}"),
        };
    }
    if pre.skip_update {
        return ContainerOutcome::Skipped {
            reason: "skip requested by pre-update hook".to_owned(),
        };
    }

    if stale_image {
        if let Err(err) = runtime
            .pull_image(&container.image_ref, opts.auth_token.as_deref())
            .await
        {
            return ContainerOutcome::Failed {
                reason: format!("pulling {}: {err:#}", container.image_ref),
            };
        }
    }

    // Rename must be committed before the replacement takes the name; a
    // rename failure aborts with the original container untouched.
    let temp_name =
        match self_update::prepare_for_self_update(runtime, &container.id, &container.name).await
        {
            Ok(temp) => temp,
            Err(err) => {
                return ContainerOutcome::Failed {
                    reason: format!("self-update rename failed: {err:#}"),
                };
            }
        };

    let config = container.recreate_config(&container.image_ref);
    let new_id = match runtime.create_container(&container.name, config).await {
        Ok(id) => id,
        Err(err) => {
            return ContainerOutcome::Failed {
                reason: format!(
                    "creating replacement (old instance kept as {temp_name}): {err:#}"
                ),
            };
        }
    };
    if let Err(err) = runtime.start_container(&new_id).await {
        return ContainerOutcome::Failed {
            reason: format!("starting replacement (old instance kept as {temp_name}): {err:#}"),
        };
    }

    info!(
        container = %container.name,
        old_instance = %temp_name,
        "replacement instance started; old instance will be cleaned up on next startup"
    );
    ContainerOutcome::Updated
}

async fn pull_and_compare(
    runtime: &impl ContainerRuntime,
    container: &ManagedContainer,
    opts: &PassOptions,
) -> Result<bool> {
    runtime
        .pull_image(&container.image_ref, opts.auth_token.as_deref())
        .await
        .with_context(|| format!("pulling {}", container.image_ref))?;
    digest::compare_with_pulled(runtime, &container.image_id, &container.image_ref).await
}
