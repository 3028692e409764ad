//! CLI argument parsing with clap derive

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;
use crate::output::OutputContext;

/// Gated configuration deployment for managed hosts
#[derive(Parser)]
#[command(
    name = "confgate",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Engine config file (default: /etc/confgate/config.yaml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Apply the staged configuration proposal
    Apply(commands::apply::ApplyArgs),

    /// Restore a backup snapshot
    Rollback(commands::rollback::RollbackArgs),

    /// Show pending proposal, last apply, and backups
    Status,

    /// List recent applies
    History(commands::history::HistoryArgs),
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<()> {
        let Cli { json, quiet, no_color, config, command } = self;
        let ctx = OutputContext::new(no_color, quiet);
        let config = commands::load_config(config.as_deref())?;
        match command {
            Command::Apply(args) => commands::apply::run(&ctx, &config, json, args).await,
            Command::Rollback(args) => commands::rollback::run(&ctx, &config, json, args).await,
            Command::Status => commands::status::run(&ctx, &config, json),
            Command::History(args) => commands::history::run(&ctx, &config, json, args),
        }
    }
}
