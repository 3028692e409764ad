//! Staging area — the pending manifest and its source files, plus the
//! applied-archive lifecycle.
//!
//! The Proposal Generator writes into the staging root; this engine consumes
//! the manifest exactly once and archives the whole staging subtree by
//! rename (suffixed `-FAILED` when the apply was rolled back).

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::domain::Manifest;

/// File name of the pending manifest inside the staging root.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Archive directory-name format, e.g. `20260823T141503Z`.
const ARCHIVE_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// One engine's staging root.
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Load the pending manifest, or `None` when nothing is staged.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest exists but cannot be read or parsed.
    pub fn load_manifest(&self) -> Result<Option<Manifest>> {
        let path = self.root.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading manifest {}", path.display()))?;
        let manifest = serde_json::from_str(&content)
            .with_context(|| format!("parsing manifest {}", path.display()))?;
        Ok(Some(manifest))
    }

    /// Absolute path of a change's staged source file.
    ///
    /// # Errors
    ///
    /// Returns an error if the relative source path would escape the staging
    /// root (absolute, or containing `.`/`..` components).
    pub fn source_path(&self, source: &str) -> Result<PathBuf> {
        let rel = Path::new(source);
        anyhow::ensure!(
            !rel.as_os_str().is_empty() && rel.is_relative(),
            "source must be a relative path: {source}"
        );
        anyhow::ensure!(
            rel.components().all(|c| matches!(c, Component::Normal(_))),
            "source must not contain '.' or '..' components: {source}"
        );
        Ok(self.root.join(rel))
    }

    /// Archive the whole staging subtree under the applied root, suffixed
    /// `-FAILED` when the apply was rolled back, and recreate an empty
    /// staging root for the next proposal. Returns the archive entry name.
    ///
    /// # Errors
    ///
    /// Returns an error if the rename fails.
    pub fn archive(
        &self,
        applied_root: &Path,
        now: DateTime<Utc>,
        failed: bool,
    ) -> Result<String> {
        std::fs::create_dir_all(applied_root)
            .with_context(|| format!("creating {}", applied_root.display()))?;

        let suffix = if failed { "-FAILED" } else { "" };
        let mut name = format!("{}{suffix}", now.format(ARCHIVE_FORMAT));
        let mut attempt = 1;
        while applied_root.join(&name).exists() {
            attempt += 1;
            name = format!("{}-{attempt}{suffix}", now.format(ARCHIVE_FORMAT));
        }

        let target = applied_root.join(&name);
        std::fs::rename(&self.root, &target).with_context(|| {
            format!(
                "archiving {} to {}",
                self.root.display(),
                target.display()
            )
        })?;
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("recreating {}", self.root.display()))?;
        Ok(name)
    }
}

/// One entry in the applied archive.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ArchiveEntry {
    pub name: String,
    pub failed: bool,
    pub description: Option<String>,
    pub changes: Option<usize>,
}

/// Archive entries sorted newest-first. Entries whose manifest is missing or
/// unreadable still appear, with `description`/`changes` unset.
///
/// # Errors
///
/// Returns an error if the applied root exists but cannot be read.
pub fn list_archive(applied_root: &Path) -> Result<Vec<ArchiveEntry>> {
    if !applied_root.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in std::fs::read_dir(applied_root)
        .with_context(|| format!("reading {}", applied_root.display()))?
    {
        let entry = entry.context("reading applied root entry")?;
        if entry.path().is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    names.reverse();

    let mut entries = Vec::with_capacity(names.len());
    for name in names {
        let failed = name.ends_with("-FAILED");
        let manifest: Option<Manifest> = std::fs::read_to_string(
            applied_root.join(&name).join(MANIFEST_FILE),
        )
        .ok()
        .and_then(|content| serde_json::from_str(&content).ok());
        entries.push(ArchiveEntry {
            name,
            failed,
            description: manifest.as_ref().map(|m| m.description.clone()),
            changes: manifest.as_ref().map(|m| m.changes.len()),
        });
    }
    Ok(entries)
}

// ── Unit tests ───────────────────────────────────────────────────────────────
