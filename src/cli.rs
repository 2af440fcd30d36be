//! CLI argument parsing with clap derive.

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

/// Dependency-aware container image update orchestration
#[derive(Parser)]
#[command(
    name = "arcane-updater",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run one update orchestration pass
    Update(commands::update::UpdateArgs),

    /// Report which containers have updates available, without acting
    Check(commands::check::CheckArgs),

    /// Remove abandoned updater instances left by interrupted self-updates
    Cleanup(commands::cleanup::CleanupArgs),
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<()> {
        let Cli { json, command } = self;
        match command {
            Command::Update(args) => commands::update::run(&args, json).await,
            Command::Check(args) => commands::check::run(&args, json).await,
            Command::Cleanup(args) => commands::cleanup::run(&args, json).await,
        }
    }
}
