//! Operator-initiated rollback to a prior snapshot.
//!
//! Unlike the automatic revert inside the apply pipeline, this runs against
//! an otherwise quiescent engine: it restores a snapshot (latest by default)
//! and restarts whatever services the most recent archived manifest touched,
//! since those are the ones now running on reverted files.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::application::ports::{ProgressReporter, ServiceManager};
use crate::application::services::restart_services;
use crate::domain::{ApprovalToken, EngineConfig, EngineError};
use crate::infra::audit::AuditLog;
use crate::infra::backup::BackupManager;
use crate::infra::staging::{MANIFEST_FILE, list_archive};

/// What a completed rollback reports back.
#[derive(Debug)]
pub struct RollbackOutcome {
    /// Snapshot that was restored.
    pub snapshot: String,
    /// Files restored from it.
    pub restored: usize,
    /// Services restarted afterwards.
    pub restarted: Vec<String>,
}

/// The rollback use case over its ports.
pub struct RollbackService<'a, S, P>
where
    S: ServiceManager,
    P: ProgressReporter,
{
    pub config: &'a EngineConfig,
    pub services: &'a S,
    pub audit: &'a AuditLog,
    pub reporter: &'a P,
}

impl<S, P> RollbackService<'_, S, P>
where
    S: ServiceManager,
    P: ProgressReporter,
{
    /// Restore `snapshot` (or the most recent one when `None`) and restart
    /// the services named by the newest archived manifest.
    ///
    /// # Errors
    ///
    /// `EngineError::Rollback` when the snapshot is missing or the restore
    /// fails; any other error if the audit log cannot be written.
    pub async fn roll_back(
        &self,
        token: &ApprovalToken,
        snapshot: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<RollbackOutcome> {
        self.audit.record(
            "rollback",
            json!({
                "token": token.as_str(),
                "requested": snapshot,
                "ts_invoked": now.to_rfc3339(),
            }),
        )?;

        let backups = BackupManager::new(&self.config.backup_root);
        let name = match snapshot {
            Some(name) => {
                if !backups.snapshot_path(name).is_dir() {
                    return Err(EngineError::Rollback(format!("no such snapshot: {name}")).into());
                }
                name.to_string()
            }
            None => backups
                .latest()?
                .ok_or_else(|| EngineError::Rollback("no snapshots to roll back to".to_string()))?,
        };

        self.reporter.step(&format!("restoring snapshot {name}"));
        let restored = backups
            .restore(&name)
            .map_err(|e| EngineError::Rollback(format!("{e:#}")))?;
        self.reporter
            .success(&format!("restored {restored} files from {name}"));

        let targets = self.last_applied_targets()?;
        let target_refs: Vec<&str> = targets.iter().map(String::as_str).collect();
        let (restarted, skipped) =
            restart_services(&target_refs, self.config, self.services, self.reporter).await;

        self.audit.record(
            "result",
            json!({
                "status": "rolled_back",
                "snapshot": name,
                "restored": restored,
                "restarted": restarted,
                "skipped": skipped,
            }),
        )?;
        Ok(RollbackOutcome {
            snapshot: name,
            restored,
            restarted,
        })
    }

    /// Restart targets of the newest archived manifest, or none when the
    /// archive is empty or its manifest is unreadable.
    fn last_applied_targets(&self) -> Result<Vec<String>> {
        let entries = list_archive(&self.config.applied_root)?;
        let Some(entry) = entries.first() else {
            return Ok(Vec::new());
        };
        let path = self
            .config
            .applied_root
            .join(&entry.name)
            .join(MANIFEST_FILE);
        let Ok(content) = std::fs::read_to_string(&path) else {
            self.reporter
                .warn("latest archive has no readable manifest; skipping restarts");
            return Ok(Vec::new());
        };
        let manifest: crate::domain::Manifest = serde_json::from_str(&content)
            .map_err(|e| EngineError::Rollback(format!("parsing {}: {e}", path.display())))?;
        Ok(manifest
            .restart_targets()
            .into_iter()
            .map(str::to_string)
            .collect())
    }
}

// Driven end to end from `tests/apply_pipeline.rs` alongside the apply
// pipeline; snapshot selection and restore mechanics are unit tested in
// `infra::backup`.
