//! Backup manager — timestamped pre-change snapshots, restore, and pruning.
//!
//! Layout: `<backup_root>/<UTC-timestamp>/<destination-path-as-relative>`.
//! A snapshot is complete before the atomic writer runs; if any copy fails
//! the apply aborts with no destination modified.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use walkdir::WalkDir;

/// Directory-name format for one snapshot, e.g. `20260823T141503Z`.
const SNAPSHOT_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Manages the backup root for one engine instance.
pub struct BackupManager {
    root: PathBuf,
}

impl BackupManager {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Snapshot every *currently existing* destination into a fresh
    /// timestamped directory. Destinations that do not exist yet are skipped
    /// — a new file has nothing to back up.
    ///
    /// Returns the snapshot name. A snapshot directory is created even when
    /// every destination is new, so rollback and audit always have a
    /// reference point for the attempt.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot directory cannot be created or any
    /// copy fails. A partial snapshot may remain for manual inspection; the
    /// caller must abort before touching any destination.
    pub fn create_snapshot(&self, destinations: &[&Path], now: DateTime<Utc>) -> Result<String> {
        let mut name = now.format(SNAPSHOT_FORMAT).to_string();
        // Same-second reruns are rare (the rate limiter throttles applies)
        // but must not silently merge two attempts into one snapshot.
        let mut attempt = 1;
        while self.root.join(&name).exists() {
            attempt += 1;
            name = format!("{}-{attempt}", now.format(SNAPSHOT_FORMAT));
        }
        let snapshot = self.root.join(&name);
        std::fs::create_dir_all(&snapshot)
            .with_context(|| format!("creating snapshot {}", snapshot.display()))?;

        for dest in destinations {
            if !dest.exists() {
                continue;
            }
            let copy_target = snapshot.join(as_relative(dest));
            if let Some(parent) = copy_target.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            std::fs::copy(dest, &copy_target).with_context(|| {
                format!("backing up {} to {}", dest.display(), copy_target.display())
            })?;
        }
        Ok(name)
    }

    /// Snapshot names sorted oldest-first.
    ///
    /// # Errors
    ///
    /// Returns an error if the backup root exists but cannot be read.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)
            .with_context(|| format!("reading {}", self.root.display()))?
        {
            let entry = entry.context("reading backup root entry")?;
            let name = entry.file_name().to_string_lossy().into_owned();
            // Snapshot names are timestamps; anything else in the root is
            // not ours to touch.
            if entry.path().is_dir() && name.starts_with("20") {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Most recent snapshot name, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backup root cannot be read.
    pub fn latest(&self) -> Result<Option<String>> {
        Ok(self.list()?.pop())
    }

    /// Full path of a named snapshot.
    #[must_use]
    pub fn snapshot_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Copy every file in the snapshot back to its original absolute path.
    ///
    /// Not transactional: an interrupted restore leaves a known-bad state
    /// requiring manual intervention, which the caller surfaces as a
    /// rollback failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot is missing or any copy-back fails.
    pub fn restore(&self, name: &str) -> Result<usize> {
        let snapshot = self.snapshot_path(name);
        anyhow::ensure!(
            snapshot.is_dir(),
            "backup snapshot not found: {}",
            snapshot.display()
        );

        let mut restored = 0;
        for entry in WalkDir::new(&snapshot) {
            let entry = entry.with_context(|| format!("walking {}", snapshot.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&snapshot)
                .context("snapshot entry outside snapshot root")?;
            let original = Path::new("/").join(relative);
            if let Some(parent) = original.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            std::fs::copy(entry.path(), &original).with_context(|| {
                format!(
                    "restoring {} to {}",
                    entry.path().display(),
                    original.display()
                )
            })?;
            restored += 1;
        }
        Ok(restored)
    }

    /// Delete the oldest snapshots beyond `retain`. Returns the deleted
    /// names. Runs only after a successful apply, never during rollback.
    ///
    /// # Errors
    ///
    /// Returns an error if a stale snapshot cannot be removed.
    pub fn prune(&self, retain: usize) -> Result<Vec<String>> {
        let names = self.list()?;
        if names.len() <= retain {
            return Ok(Vec::new());
        }
        let excess = names.len() - retain;
        let mut deleted = Vec::with_capacity(excess);
        for name in &names[..excess] {
            let path = self.root.join(name);
            std::fs::remove_dir_all(&path)
                .with_context(|| format!("pruning {}", path.display()))?;
            deleted.push(name.clone());
        }
        Ok(deleted)
    }
}

/// Strip the root component so an absolute destination nests inside a
/// snapshot directory.
fn as_relative(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| matches!(c, std::path::Component::Normal(_)))
        .collect()
}

// ── Unit tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> BackupManager {
        BackupManager::new(dir.path().join("backups"))
    }

    #[test]
    fn test_snapshot_copies_existing_destinations() {
        let dir = TempDir::new().expect("tempdir");
        let mgr = manager(&dir);
        let dest = dir.path().join("live.conf");
        std::fs::write(&dest, b"current state").expect("write");

        let name = mgr
            .create_snapshot(&[&dest], Utc::now())
            .expect("snapshot");
        let copied = mgr.snapshot_path(&name).join(as_relative(&dest));
        assert_eq!(std::fs::read(&copied).expect("read copy"), b"current state");
    }

    #[test]
    fn test_snapshot_skips_missing_destinations() {
        let dir = TempDir::new().expect("tempdir");
        let mgr = manager(&dir);
        let missing = dir.path().join("not-yet.conf");

        let name = mgr
            .create_snapshot(&[&missing], Utc::now())
            .expect("snapshot");
        // Snapshot dir exists but holds nothing for the new file.
        assert!(mgr.snapshot_path(&name).is_dir());
        assert!(!mgr.snapshot_path(&name).join(as_relative(&missing)).exists());
    }

    #[test]
    fn test_same_second_snapshots_get_distinct_names() {
        let dir = TempDir::new().expect("tempdir");
        let mgr = manager(&dir);
        let now = Utc::now();
        let first = mgr.create_snapshot(&[], now).expect("first");
        let second = mgr.create_snapshot(&[], now).expect("second");
        assert_ne!(first, second);
        assert_eq!(mgr.list().expect("list").len(), 2);
    }

    #[test]
    fn test_restore_round_trips_bytes() {
        let dir = TempDir::new().expect("tempdir");
        let mgr = manager(&dir);
        let dest = dir.path().join("svc.conf");
        std::fs::write(&dest, b"before").expect("write");

        let name = mgr.create_snapshot(&[&dest], Utc::now()).expect("snapshot");
        std::fs::write(&dest, b"after").expect("overwrite");

        let restored = mgr.restore(&name).expect("restore");
        assert_eq!(restored, 1);
        assert_eq!(std::fs::read(&dest).expect("read"), b"before");
    }

    #[test]
    fn test_restore_unknown_snapshot_is_error() {
        let dir = TempDir::new().expect("tempdir");
        assert!(manager(&dir).restore("20990101T000000Z").is_err());
    }

    #[test]
    fn test_list_is_sorted_and_ignores_foreign_entries() {
        let dir = TempDir::new().expect("tempdir");
        let mgr = manager(&dir);
        for name in ["20260102T000000Z", "20260101T000000Z", "20260103T000000Z"] {
            std::fs::create_dir_all(dir.path().join("backups").join(name)).expect("mkdir");
        }
        std::fs::create_dir_all(dir.path().join("backups").join("lost+found")).expect("mkdir");
        std::fs::write(dir.path().join("backups").join("README"), b"x").expect("write");

        let names = mgr.list().expect("list");
        assert_eq!(
            names,
            vec![
                "20260101T000000Z".to_string(),
                "20260102T000000Z".to_string(),
                "20260103T000000Z".to_string(),
            ]
        );
        assert_eq!(mgr.latest().expect("latest").as_deref(), Some("20260103T000000Z"));
    }

    #[test]
    fn test_prune_deletes_exactly_the_oldest_excess() {
        let dir = TempDir::new().expect("tempdir");
        let mgr = manager(&dir);
        for i in 0..25 {
            let name = format!("20260101T{i:02}0000Z");
            std::fs::create_dir_all(dir.path().join("backups").join(name)).expect("mkdir");
        }

        let deleted = mgr.prune(20).expect("prune");
        assert_eq!(deleted.len(), 5);
        assert_eq!(
            deleted,
            (0..5)
                .map(|i| format!("20260101T{i:02}0000Z"))
                .collect::<Vec<_>>()
        );
        let remaining = mgr.list().expect("list");
        assert_eq!(remaining.len(), 20);
        assert_eq!(remaining[0], "20260101T050000Z");
    }

    #[test]
    fn test_prune_under_ceiling_is_noop() {
        let dir = TempDir::new().expect("tempdir");
        let mgr = manager(&dir);
        std::fs::create_dir_all(dir.path().join("backups").join("20260101T000000Z"))
            .expect("mkdir");
        assert!(mgr.prune(20).expect("prune").is_empty());
        assert_eq!(mgr.list().expect("list").len(), 1);
    }
}
