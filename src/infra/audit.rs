//! Append-only JSONL audit log.
//!
//! One record per pipeline step plus a unified diff per applied change, so a
//! reviewer can replay exactly what the engine did and why.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use similar::TextDiff;

/// Audit log writer for one engine instance.
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append one record: `{"ts": ..., "step": ..., <detail fields>}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be opened or written.
    pub fn record(&self, step: &str, detail: serde_json::Value) -> Result<()> {
        let mut entry = serde_json::Map::new();
        entry.insert(
            "ts".to_string(),
            serde_json::Value::String(Utc::now().to_rfc3339()),
        );
        entry.insert(
            "step".to_string(),
            serde_json::Value::String(step.to_string()),
        );
        if let serde_json::Value::Object(fields) = detail {
            entry.extend(fields);
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening audit log {}", self.path.display()))?;
        let line =
            serde_json::to_string(&serde_json::Value::Object(entry)).context("serializing audit record")?;
        writeln!(file, "{line}").with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }

    /// Record the unified diff between a destination's previous and new
    /// content. `previous` is `None` for a brand-new file.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be written.
    pub fn record_diff(&self, dest: &Path, previous: Option<&str>, new: &str) -> Result<()> {
        let diff = unified_diff(dest, previous, new);
        self.record(
            "diff",
            serde_json::json!({
                "dest": dest.display().to_string(),
                "new_file": previous.is_none(),
                "diff": diff,
            }),
        )
    }
}

/// Unified diff between the previous and new destination content.
#[must_use]
pub fn unified_diff(dest: &Path, previous: Option<&str>, new: &str) -> String {
    let old = previous.unwrap_or("");
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(3)
        .header(
            &format!("current: {}", dest.display()),
            &format!("proposed: {}", dest.display()),
        )
        .to_string()
}

// ── Unit tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn read_records(path: &Path) -> Vec<serde_json::Value> {
        std::fs::read_to_string(path)
            .expect("audit log readable")
            .lines()
            .map(|l| serde_json::from_str(l).expect("each line is JSON"))
            .collect()
    }

    #[test]
    fn test_record_appends_jsonl_with_ts_and_step() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("logs").join("audit.jsonl");
        let log = AuditLog::new(&path);
        log.record("validate", serde_json::json!({"changes": 2}))
            .expect("record");
        log.record("result", serde_json::json!({"status": "applied"}))
            .expect("record");

        let records = read_records(&path);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["step"], "validate");
        assert_eq!(records[0]["changes"], 2);
        assert!(records[0]["ts"].as_str().is_some());
        assert_eq!(records[1]["status"], "applied");
    }

    #[test]
    fn test_unified_diff_shows_changed_lines() {
        let diff = unified_diff(
            Path::new("/opt/managed/app.conf"),
            Some("interval=10\nretries=3\n"),
            "interval=30\nretries=3\n",
        );
        assert!(diff.contains("-interval=10"));
        assert!(diff.contains("+interval=30"));
        assert!(diff.contains("current: /opt/managed/app.conf"));
    }

    #[test]
    fn test_unified_diff_for_new_file_is_all_additions() {
        let diff = unified_diff(Path::new("/opt/managed/new.conf"), None, "a\nb\n");
        assert!(diff.contains("+a"));
        assert!(diff.contains("+b"));
        assert!(!diff.contains("\n-"));
    }

    #[test]
    fn test_record_diff_embeds_diff_text() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("audit.jsonl");
        let log = AuditLog::new(&path);
        log.record_diff(Path::new("/opt/managed/x.conf"), Some("old\n"), "new\n")
            .expect("record");

        let records = read_records(&path);
        assert_eq!(records[0]["step"], "diff");
        assert_eq!(records[0]["new_file"], false);
        let text = records[0]["diff"].as_str().expect("diff is a string");
        assert!(text.contains("-old"));
        assert!(text.contains("+new"));
    }
}
