//! `update` command — run one orchestration pass against the local daemon.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::services::orchestrator::{
    self, ContainerOutcome, PassOptions, PassReport,
};
use crate::application::services::self_update;
use crate::infra::docker::DockerRuntime;
use crate::infra::registry::HttpRegistryClient;

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Registry bearer token for metadata probes and pulls
    #[arg(long, env = "ARCANE_REGISTRY_TOKEN", hide_env_values = true)]
    pub auth_token: Option<String>,

    /// Seconds to wait for a container to stop before it is killed
    #[arg(long, default_value_t = 10)]
    pub stop_grace: u64,

    /// Restrict the pass to these container names (default: all running)
    #[arg(long = "container")]
    pub containers: Vec<String>,
}

/// # Errors
///
/// Returns an error if the daemon is unreachable, candidate discovery
/// fails, or the pass aborts with a dependency cycle.
pub async fn run(args: &UpdateArgs, json: bool) -> Result<()> {
    let runtime = DockerRuntime::connect()?;
    let registry = HttpRegistryClient::new()?;

    // Sweep leftovers from interrupted self-updates before doing new work.
    // Keep the newest in case a freshly-replaced instance is still starting.
    match self_update::cleanup_old_instances(&runtime, true).await {
        Ok(removed) if !removed.is_empty() => {
            info!(count = removed.len(), "removed abandoned updater instances");
        }
        Ok(_) => {}
        Err(err) => warn!(error = %format!("{err:#}"), "startup cleanup failed"),
    }
    if let Ok(Some(instance)) = self_update::current_instance(&runtime).await {
        debug!(
            instance = %instance.id.unwrap_or_default(),
            "running manager instance present; self-update may occur this pass"
        );
    }

    let mut candidates = orchestrator::discover_candidates(&runtime)
        .await
        .context("discovering candidate containers")?;
    if !args.containers.is_empty() {
        candidates.retain(|c| args.containers.iter().any(|n| n == &c.name));
    }
    info!(candidates = candidates.len(), "starting orchestration pass");

    let cancel = CancellationToken::new();
    let signal_guard = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing current container then stopping");
            signal_guard.cancel();
        }
    });

    let opts = PassOptions {
        auth_token: args.auth_token.clone(),
        stop_grace: Duration::from_secs(args.stop_grace),
    };
    let report = orchestrator::run_pass(&runtime, &registry, candidates, &opts, &cancel).await;

    print_report(&report, json)?;
    if let Some(error) = &report.error {
        anyhow::bail!("pass aborted: {error}");
    }
    Ok(())
}

fn print_report(report: &PassReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    for container in &report.containers {
        match &container.outcome {
            ContainerOutcome::Updated => println!("{}: updated", container.name),
            ContainerOutcome::Unchanged => println!("{}: unchanged", container.name),
            ContainerOutcome::Skipped { reason } => {
                println!("{}: skipped ({reason})", container.name);
            }
            ContainerOutcome::Failed { reason } => {
                println!("{}: failed ({reason})", container.name);
            }
        }
    }
    Ok(())
}
