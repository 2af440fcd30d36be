//! `cleanup` command — standalone sweep of abandoned updater instances.

use anyhow::Result;
use clap::Args;

use crate::application::services::self_update;
use crate::infra::docker::DockerRuntime;

#[derive(Args, Debug)]
pub struct CleanupArgs {
    /// Also remove the newest renamed instance (default keeps it, in case a
    /// fresh replacement is still starting)
    #[arg(long)]
    pub include_newest: bool,
}

/// # Errors
///
/// Returns an error if the daemon is unreachable or listing fails.
pub async fn run(args: &CleanupArgs, json: bool) -> Result<()> {
    let runtime = DockerRuntime::connect()?;
    let removed = self_update::cleanup_old_instances(&runtime, !args.include_newest).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&removed)?);
    } else if removed.is_empty() {
        println!("no abandoned updater instances found");
    } else {
        for id in &removed {
            println!("removed {id}");
        }
    }
    Ok(())
}
