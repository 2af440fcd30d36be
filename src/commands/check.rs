//! `check` command — report-only staleness pass.

use anyhow::{Context, Result};
use clap::Args;

use crate::application::services::orchestrator::{self, CheckReport, PassOptions};
use crate::infra::docker::DockerRuntime;
use crate::infra::registry::HttpRegistryClient;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Registry bearer token for metadata probes
    #[arg(long, env = "ARCANE_REGISTRY_TOKEN", hide_env_values = true)]
    pub auth_token: Option<String>,
}

/// # Errors
///
/// Returns an error if the daemon is unreachable or discovery fails.
pub async fn run(args: &CheckArgs, json: bool) -> Result<()> {
    let runtime = DockerRuntime::connect()?;
    let registry = HttpRegistryClient::new()?;

    let candidates = orchestrator::discover_candidates(&runtime)
        .await
        .context("discovering candidate containers")?;

    let opts = PassOptions {
        auth_token: args.auth_token.clone(),
        ..Default::default()
    };
    let report = orchestrator::check_pass(&runtime, &registry, &candidates, &opts).await;

    print_report(&report, json)?;
    if let Some(error) = &report.error {
        anyhow::bail!("dependency sort would fail: {error}");
    }
    Ok(())
}

fn print_report(report: &CheckReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    for image in &report.images {
        let verdict = if image.needs_update {
            "update available"
        } else {
            "up to date"
        };
        let via = if image.checked_via_api {
            "registry metadata"
        } else {
            "pull required to confirm"
        };
        println!("{}: {verdict} [{}] ({via})", image.name, image.image);
        if let Some(error) = &image.error {
            println!("  note: {error}");
        }
    }
    Ok(())
}
