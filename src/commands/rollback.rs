//! Rollback command — restore a snapshot and restart affected services.

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use serde_json::json;

use crate::application::services::RollbackService;
use crate::command_runner::{RESTART_TIMEOUT, TokioCommandRunner};
use crate::domain::{ApprovalToken, EngineConfig};
use crate::infra::audit::AuditLog;
use crate::infra::services::HostServiceManager;
use crate::output::OutputContext;

/// Arguments for the rollback command.
#[derive(Args)]
pub struct RollbackArgs {
    /// Approval token issued for this rollback
    #[arg(long, env = "CONFGATE_APPROVAL_TOKEN")]
    pub token: String,

    /// Snapshot name to restore (defaults to the most recent)
    #[arg(long)]
    pub backup: Option<String>,
}

/// Restore a snapshot and restart the services the last apply touched.
///
/// # Errors
///
/// Returns an error if the snapshot cannot be restored.
pub async fn run(
    ctx: &OutputContext,
    config: &EngineConfig,
    json: bool,
    args: RollbackArgs,
) -> Result<()> {
    let services = HostServiceManager::new(TokioCommandRunner::new(RESTART_TIMEOUT));
    let audit = AuditLog::new(&config.audit_log);
    let service = RollbackService {
        config,
        services: &services,
        audit: &audit,
        reporter: ctx,
    };

    let token = ApprovalToken::new(args.token);
    let outcome = service
        .roll_back(&token, args.backup.as_deref(), Utc::now())
        .await?;
    if json {
        println!(
            "{}",
            json!({
                "status": "rolled_back",
                "snapshot": outcome.snapshot,
                "restored": outcome.restored,
                "restarted": outcome.restarted,
            })
        );
    } else {
        ctx.success(&format!(
            "restored {} files from {}",
            outcome.restored, outcome.snapshot
        ));
    }
    Ok(())
}
