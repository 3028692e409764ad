//! History command — recent archive entries, newest first.

use anyhow::{Context, Result};
use clap::Args;

use crate::application::services::StatusService;
use crate::domain::EngineConfig;
use crate::output::OutputContext;

/// Arguments for the history command.
#[derive(Args)]
pub struct HistoryArgs {
    /// Maximum number of entries to show
    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}

/// Print the apply history.
///
/// # Errors
///
/// Returns an error if the archive root cannot be read.
pub fn run(ctx: &OutputContext, config: &EngineConfig, json: bool, args: HistoryArgs) -> Result<()> {
    let entries = StatusService { config }.history(args.limit)?;
    if json {
        println!(
            "{}",
            serde_json::to_string(&entries).context("serializing history")?
        );
        return Ok(());
    }

    if entries.is_empty() {
        ctx.info("no applies recorded");
        return Ok(());
    }
    for entry in entries {
        let outcome = if entry.failed { "rolled back" } else { "applied" };
        let description = entry.description.as_deref().unwrap_or("(no manifest)");
        ctx.kv(&entry.name, &format!("{outcome}  {description}"));
    }
    Ok(())
}
