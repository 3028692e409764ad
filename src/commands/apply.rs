//! Apply command — run the full deployment pipeline on the staged manifest.

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use serde_json::json;

use crate::application::ports::as_engine_error;
use crate::application::services::ApplyService;
use crate::command_runner::{RESTART_TIMEOUT, TokioCommandRunner};
use crate::domain::{ApprovalToken, EngineConfig, EngineError};
use crate::infra::audit::AuditLog;
use crate::infra::health::UreqHttpProbe;
use crate::infra::rate_limit::FileRateLimitLedger;
use crate::infra::services::HostServiceManager;
use crate::output::OutputContext;

/// Arguments for the apply command.
#[derive(Args)]
pub struct ApplyArgs {
    /// Approval token issued for this proposal
    #[arg(long, env = "CONFGATE_APPROVAL_TOKEN")]
    pub token: String,
}

/// Execute the apply pipeline against the live host.
///
/// # Errors
///
/// Returns the pipeline error after reporting it; the process exits
/// non-zero and the `--json` result line on stdout carries the stage.
pub async fn run(
    ctx: &OutputContext,
    config: &EngineConfig,
    json: bool,
    args: ApplyArgs,
) -> Result<()> {
    let runner = TokioCommandRunner::default();
    let services = HostServiceManager::new(TokioCommandRunner::new(RESTART_TIMEOUT));
    let rate_limit = FileRateLimitLedger::new(&config.rate_limit);
    let audit = AuditLog::new(&config.audit_log);
    let service = ApplyService {
        config,
        runner: &runner,
        services: &services,
        http: &UreqHttpProbe,
        rate_limit: &rate_limit,
        audit: &audit,
        reporter: ctx,
    };

    let token = ApprovalToken::new(args.token);
    match service.apply(&token, Utc::now()).await {
        Ok(outcome) => {
            if json {
                println!(
                    "{}",
                    json!({
                        "status": "applied",
                        "backup": outcome.backup,
                        "archive": outcome.archive,
                        "changes": outcome.changes,
                        "warnings": outcome.warnings,
                    })
                );
            } else {
                ctx.success(&format!(
                    "applied {} changes (backup {})",
                    outcome.changes, outcome.backup
                ));
            }
            Ok(())
        }
        Err(err) => {
            let engine = as_engine_error(&err);
            let stage = engine.map_or("internal", EngineError::stage);
            let status = match engine {
                Some(EngineError::HealthCheck(_)) => "rolled_back",
                _ => "failed",
            };
            if json {
                println!(
                    "{}",
                    json!({
                        "status": status,
                        "stage": stage,
                        "reason": format!("{err:#}"),
                    })
                );
            }
            Err(err)
        }
    }
}
