//! Status command — pending proposal, last apply, and snapshot inventory.

use anyhow::{Context, Result};

use crate::application::services::StatusService;
use crate::domain::EngineConfig;
use crate::output::OutputContext;

/// Print current engine state.
///
/// # Errors
///
/// Returns an error if the engine's on-disk state cannot be read.
pub fn run(ctx: &OutputContext, config: &EngineConfig, json: bool) -> Result<()> {
    let report = StatusService { config }.status()?;
    if json {
        println!(
            "{}",
            serde_json::to_string(&report).context("serializing status")?
        );
        return Ok(());
    }

    ctx.header("confgate status");
    match &report.pending {
        Some(pending) => ctx.kv(
            "pending",
            &format!("'{}' ({} changes)", pending.description, pending.changes),
        ),
        None => ctx.kv("pending", "none"),
    }
    match &report.last_applied {
        Some(entry) => {
            let outcome = if entry.failed { "rolled back" } else { "applied" };
            ctx.kv("last apply", &format!("{} ({outcome})", entry.name));
        }
        None => ctx.kv("last apply", "never"),
    }
    ctx.kv(
        "backups",
        &format!(
            "{} retained{}",
            report.backups,
            report
                .latest_backup
                .as_deref()
                .map(|n| format!(", latest {n}"))
                .unwrap_or_default()
        ),
    );
    Ok(())
}
