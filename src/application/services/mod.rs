//! Application services — the engine's use cases, wired over ports.

pub mod apply;
pub mod rollback;
pub mod status;

pub use apply::{ApplyOutcome, ApplyService};
pub use rollback::{RollbackOutcome, RollbackService};
pub use status::{StatusReport, StatusService};

use crate::application::ports::{ProgressReporter, ServiceManager};
use crate::domain::EngineConfig;

/// Restart the named targets through the configured allowlist, in order.
///
/// Names with no allowlist entry are skipped with a warning rather than
/// failing the run: the files are already on disk and the health gate is
/// the arbiter of whether the host is still serving. A restart command
/// that itself errors is treated the same way.
///
/// Returns the names restarted and the names skipped.
pub async fn restart_services<S, P>(
    targets: &[&str],
    config: &EngineConfig,
    services: &S,
    reporter: &P,
) -> (Vec<String>, Vec<String>)
where
    S: ServiceManager,
    P: ProgressReporter,
{
    let mut restarted = Vec::new();
    let mut skipped = Vec::new();
    for name in targets {
        let Some(target) = config.restartable(name) else {
            reporter.warn(&format!("service '{name}' is not restartable here; skipping"));
            skipped.push((*name).to_string());
            continue;
        };
        reporter.step(&format!("restarting {name}"));
        match services.restart(target).await {
            Ok(()) => restarted.push((*name).to_string()),
            Err(err) => {
                reporter.warn(&format!("restart of '{name}' failed: {err:#}"));
                skipped.push((*name).to_string());
            }
        }
    }
    (restarted, skipped)
}

// ── Unit tests ───────────────────────────────────────────────────────────────
