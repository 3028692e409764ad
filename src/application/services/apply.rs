//! The apply pipeline — validate, gate, back up, write, restart, verify,
//! and on health failure revert.
//!
//! Strictly sequential within one invocation. There is no cancellation once
//! backup begins: a half-applied manifest is the exact condition this engine
//! exists to prevent, so the pipeline runs to completion (success or
//! rollback) instead of being abortable.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::application::ports::{
    HttpProbe, ProgressReporter, RateLimitStore, ServiceManager,
};
use crate::application::services::restart_services;
use crate::command_runner::CommandRunner;
use crate::domain::{ApprovalToken, Change, EngineConfig, EngineError, Manifest};
use crate::infra::audit::AuditLog;
use crate::infra::backup::BackupManager;
use crate::infra::health::{HealthChecker, failure_summary};
use crate::infra::staging::StagingArea;
use crate::infra::fs as enginefs;
use crate::infra::validators::{Verdict, check_text_and_size, role_for};

/// Everything a successful apply reports back.
#[derive(Debug)]
pub struct ApplyOutcome {
    /// Snapshot name created before the write phase.
    pub backup: String,
    /// Name of the archived manifest entry.
    pub archive: String,
    /// Number of deployed changes.
    pub changes: usize,
    /// Non-fatal validation and restart warnings.
    pub warnings: Vec<String>,
}

/// One change after validation: all paths resolved, all attributes parsed.
struct ValidatedChange {
    source: PathBuf,
    dest: PathBuf,
    mode: u32,
    owner: Option<(u32, u32)>,
}

/// The apply pipeline over its ports.
pub struct ApplyService<'a, R, S, H, L, P>
where
    R: CommandRunner,
    S: ServiceManager,
    H: HttpProbe,
    L: RateLimitStore,
    P: ProgressReporter,
{
    pub config: &'a EngineConfig,
    pub runner: &'a R,
    pub services: &'a S,
    pub http: &'a H,
    pub rate_limit: &'a L,
    pub audit: &'a AuditLog,
    pub reporter: &'a P,
}

impl<R, S, H, L, P> ApplyService<'_, R, S, H, L, P>
where
    R: CommandRunner,
    S: ServiceManager,
    H: HttpProbe,
    L: RateLimitStore,
    P: ProgressReporter,
{
    /// Process the pending manifest.
    ///
    /// # Errors
    ///
    /// Returns the `EngineError` variant for the stage that failed. A
    /// `HealthCheck` error means the manifest was applied and then rolled
    /// back; a `Rollback` error means even that recovery failed and manual
    /// intervention is required. All other variants mean no destination was
    /// modified.
    pub async fn apply(&self, token: &ApprovalToken, now: DateTime<Utc>) -> Result<ApplyOutcome> {
        self.audit.record(
            "apply",
            json!({"token": token.as_str(), "ts_invoked": now.to_rfc3339()}),
        )?;

        // Rate gate first: a throttled caller must not learn anything about
        // the staged manifest, and budget is consumed at admission.
        self.rate_limit.check_and_record(now)?;

        let staging = StagingArea::new(&self.config.staging_root);
        let manifest = staging
            .load_manifest()?
            .ok_or_else(|| EngineError::Validation("no pending proposal".to_string()))?;
        self.reporter.step(&format!(
            "applying '{}' ({} changes)",
            manifest.description,
            manifest.changes.len()
        ));

        // Validate every change before touching the live filesystem.
        let mut warnings = Vec::new();
        let validated = self
            .validate_all(&staging, &manifest, &mut warnings)
            .await?;
        self.audit.record(
            "validate",
            json!({"changes": validated.len(), "warnings": warnings}),
        )?;
        for warning in &warnings {
            self.reporter.warn(warning);
        }
        self.reporter.success("validation passed");

        // Snapshot current state. Any failure here aborts with destinations
        // untouched; a partial snapshot is left for manual inspection.
        let backups = BackupManager::new(&self.config.backup_root);
        let dests: Vec<&std::path::Path> = validated.iter().map(|c| c.dest.as_path()).collect();
        let backup_name = backups
            .create_snapshot(&dests, now)
            .map_err(|e| EngineError::Backup(format!("{e:#}")))?;
        self.audit.record("backup", json!({"snapshot": backup_name}))?;
        self.reporter.success(&format!("backup {backup_name}"));

        // Deploy. Write failures abort without self-cleanup; the snapshot
        // and the audit trail say exactly how far we got.
        for change in &validated {
            let previous = enginefs::read_text_lossy(&change.dest)
                .map_err(|e| EngineError::Write(format!("{e:#}")))?;
            enginefs::deploy_file(&change.source, &change.dest, change.mode, change.owner)
                .map_err(|e| EngineError::Write(format!("{e:#}")))?;
            let new = enginefs::read_text_lossy(&change.dest)
                .map_err(|e| EngineError::Write(format!("{e:#}")))?
                .unwrap_or_default();
            self.audit
                .record_diff(&change.dest, previous.as_deref(), &new)?;
        }
        self.reporter
            .success(&format!("deployed {} files", validated.len()));

        // Restart affected services, then let them settle.
        let (restarted, skipped) = restart_services(
            &manifest.restart_targets(),
            self.config,
            self.services,
            self.reporter,
        )
        .await;
        self.audit
            .record("restart", json!({"restarted": restarted, "skipped": skipped}))?;
        if !restarted.is_empty() {
            tokio::time::sleep(std::time::Duration::from_secs(
                self.config.services.settle_seconds,
            ))
            .await;
        }

        // Health gate: the one failure mode with an automated recovery path.
        let checker = HealthChecker::new(self.http, self.services, self.config);
        let reports = checker.evaluate(&manifest.health_checks).await?;
        for report in &reports {
            self.audit.record(
                "health",
                json!({
                    "check": report.description,
                    "passed": report.passed,
                    "detail": report.detail,
                }),
            )?;
        }
        if let Some(summary) = failure_summary(&reports) {
            self.reporter.warn(&format!("health checks failed: {summary}"));
            return Err(self
                .roll_back(&staging, &manifest, &backups, &backup_name, &summary, now)
                .await);
        }

        // Keep the deployment: archive the consumed manifest and prune.
        let archive = staging
            .archive(&self.config.applied_root, now, false)
            .context("archiving applied manifest")?;
        let pruned = backups.prune(self.config.backups.retain)?;
        self.audit.record(
            "result",
            json!({
                "status": "applied",
                "backup": backup_name,
                "archive": archive,
                "pruned": pruned,
            }),
        )?;
        Ok(ApplyOutcome {
            backup: backup_name,
            archive,
            changes: validated.len(),
            warnings,
        })
    }

    /// Validate every change, collecting all fatal issues so a bad proposal
    /// is reported in full rather than one problem at a time.
    async fn validate_all(
        &self,
        staging: &StagingArea,
        manifest: &Manifest,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<ValidatedChange>> {
        if manifest.changes.is_empty() {
            return Err(EngineError::Validation("manifest has no changes".to_string()).into());
        }
        let whitelist = self.config.path_whitelist();
        if whitelist.is_empty() {
            return Err(EngineError::Validation(
                "destination whitelist is empty; refusing to apply".to_string(),
            )
            .into());
        }

        let mut issues = Vec::new();
        let mut validated = Vec::with_capacity(manifest.changes.len());
        for change in &manifest.changes {
            match self
                .validate_change(staging, change, &whitelist, warnings)
                .await
            {
                Ok(v) => validated.push(v),
                Err(err) => issues.push(format!("{err:#}")),
            }
        }
        if !issues.is_empty() {
            return Err(EngineError::Validation(issues.join("; ")).into());
        }
        Ok(validated)
    }

    async fn validate_change(
        &self,
        staging: &StagingArea,
        change: &Change,
        whitelist: &crate::domain::PathWhitelist,
        warnings: &mut Vec<String>,
    ) -> Result<ValidatedChange> {
        let source = staging.source_path(&change.source)?;
        check_text_and_size(&source)?;

        let dest = enginefs::canonicalize_destination(&change.dest)
            .map_err(|e| EngineError::Validation(format!("{e:#}")))?;
        if !whitelist.allows(&dest) {
            return Err(EngineError::Validation(format!(
                "destination not whitelisted: {}",
                change.dest.display()
            ))
            .into());
        }

        let mode = change.mode_bits()?;
        let (user, group) = change.owner_parts()?;
        #[cfg(unix)]
        let owner = Some(
            enginefs::resolve_owner(user, group)
                .map_err(|e| EngineError::Validation(format!("{e:#}")))?,
        );
        #[cfg(not(unix))]
        let owner = {
            let _ = (user, group);
            None
        };

        // Content check dispatches on the DESTINATION's role: the staged
        // copy is what will live at that path.
        match role_for(&change.dest)
            .validate(self.runner, &source)
            .await?
        {
            Verdict::Passed => {}
            Verdict::Warning(msg) => warnings.push(msg),
        }

        if let Some(restart) = change.restart.as_deref() {
            if self.config.restartable(restart).is_none() {
                warnings.push(format!(
                    "restart target '{restart}' is not in the allowlist; file will land without a restart"
                ));
            }
        }

        Ok(ValidatedChange {
            source,
            dest,
            mode,
            owner,
        })
    }

    /// Restore the snapshot and re-settle services. Returns the error to
    /// surface: `HealthCheck` when the rollback succeeded, `Rollback` when
    /// it did not.
    async fn roll_back(
        &self,
        staging: &StagingArea,
        manifest: &Manifest,
        backups: &BackupManager,
        backup_name: &str,
        summary: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Error {
        let _ = self
            .audit
            .record("rollback", json!({"snapshot": backup_name, "reason": summary}));
        self.reporter.step(&format!("rolling back to {backup_name}"));

        if let Err(err) = backups.restore(backup_name) {
            let _ = self
                .audit
                .record("result", json!({"status": "rollback_failed", "error": format!("{err:#}")}));
            return EngineError::Rollback(format!("{err:#}")).into();
        }
        let (restarted, _) = restart_services(
            &manifest.restart_targets(),
            self.config,
            self.services,
            self.reporter,
        )
        .await;

        // Archive the failed manifest so the attempt stays replayable.
        let archived = staging.archive(&self.config.applied_root, now, true);
        let _ = self.audit.record(
            "result",
            json!({
                "status": "rolled_back",
                "backup": backup_name,
                "restarted": restarted,
                "archive": archived.as_deref().unwrap_or("(archive failed)"),
                "reason": summary,
            }),
        );
        EngineError::HealthCheck(summary.to_string()).into()
    }
}

// Integration-level coverage for this pipeline lives in
// `tests/apply_pipeline.rs`, which drives it end to end against tempdir
// roots with mock service, HTTP, and rate-limit ports.
