//! Read-only engine status and apply history.

use anyhow::Result;
use serde::Serialize;

use crate::domain::EngineConfig;
use crate::infra::backup::BackupManager;
use crate::infra::staging::{ArchiveEntry, StagingArea, list_archive};

/// Snapshot of the engine's state, serializable for `--json` output.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    /// The staged manifest waiting for an apply, if any.
    pub pending: Option<PendingProposal>,
    /// Most recent archive entry (applied or failed).
    pub last_applied: Option<ArchiveEntry>,
    /// Number of snapshots currently retained.
    pub backups: usize,
    /// Name of the newest snapshot.
    pub latest_backup: Option<String>,
}

/// Summary of the staged manifest.
#[derive(Debug, Serialize)]
pub struct PendingProposal {
    pub description: String,
    pub changes: usize,
    pub restart_targets: Vec<String>,
}

/// Read-only queries over the engine's on-disk state.
pub struct StatusService<'a> {
    pub config: &'a EngineConfig,
}

impl StatusService<'_> {
    /// Current engine status.
    ///
    /// # Errors
    ///
    /// Returns an error if the staging manifest is corrupt or the backup or
    /// archive roots cannot be read.
    pub fn status(&self) -> Result<StatusReport> {
        let staging = StagingArea::new(&self.config.staging_root);
        let pending = staging.load_manifest()?.map(|m| PendingProposal {
            restart_targets: m.restart_targets().iter().map(|s| (*s).to_string()).collect(),
            changes: m.changes.len(),
            description: m.description,
        });

        let backups = BackupManager::new(&self.config.backup_root);
        let names = backups.list()?;
        let mut history = list_archive(&self.config.applied_root)?;

        Ok(StatusReport {
            pending,
            last_applied: if history.is_empty() {
                None
            } else {
                Some(history.remove(0))
            },
            latest_backup: names.last().cloned(),
            backups: names.len(),
        })
    }

    /// The most recent `limit` archive entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive root cannot be read.
    pub fn history(&self, limit: usize) -> Result<Vec<ArchiveEntry>> {
        let mut entries = list_archive(&self.config.applied_root)?;
        entries.truncate(limit);
        Ok(entries)
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
