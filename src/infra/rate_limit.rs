//! File-backed apply-rate ledger.
//!
//! An append-only JSON array of RFC 3339 timestamps. Entries older than the
//! window are ignored, never purged — growth is bounded in practice by the
//! ceiling itself. Check-and-record is one atomic step behind a mutex so two
//! near-simultaneous in-process invocations cannot both be admitted.

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};

use crate::application::ports::RateLimitStore;
use crate::domain::EngineError;
use crate::domain::config::RateLimitConfig;

/// Production ledger persisted at the configured path.
pub struct FileRateLimitLedger {
    path: PathBuf,
    max_applies: usize,
    window_minutes: i64,
    gate: Mutex<()>,
}

impl FileRateLimitLedger {
    #[must_use]
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            path: config.ledger.clone(),
            max_applies: config.max_applies,
            window_minutes: config.window_minutes,
            gate: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<Vec<DateTime<Utc>>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading ledger {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("parsing ledger {}", self.path.display()))
    }

    fn save(&self, entries: &[DateTime<Utc>]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(entries).context("serializing ledger")?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("writing ledger {}", self.path.display()))
    }
}

impl RateLimitStore for FileRateLimitLedger {
    fn check_and_record(&self, now: DateTime<Utc>) -> Result<()> {
        let _guard = self
            .gate
            .lock()
            .map_err(|_| anyhow::anyhow!("rate limit gate poisoned"))?;

        let mut entries = self.load()?;
        let window_start = now - Duration::minutes(self.window_minutes);
        let recent = entries
            .iter()
            .filter(|ts| **ts > window_start && **ts <= now)
            .count();
        if recent >= self.max_applies {
            return Err(EngineError::RateLimitExceeded {
                count: recent,
                max: self.max_applies,
                window_minutes: self.window_minutes,
            }
            .into());
        }
        entries.push(now);
        self.save(&entries)
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
