//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` — never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::domain::{EngineError, ServiceTarget};

// ── Service management ────────────────────────────────────────────────────────

/// Restart and inspect host services (systemd units and docker containers).
#[allow(async_fn_in_trait)]
pub trait ServiceManager {
    /// Restart one allowlisted service.
    async fn restart(&self, target: &ServiceTarget) -> Result<()>;

    /// The service manager's reported state for the target, lowercase
    /// (e.g. `"active"`, `"inactive"`, `"running"`).
    async fn state(&self, target: &ServiceTarget) -> Result<String>;
}

// ── HTTP probing ──────────────────────────────────────────────────────────────

/// Issue a bounded-timeout GET and report the status code.
///
/// Sync trait — the one production implementation (`ureq`) is blocking, and
/// health checks are strictly sequential anyway.
pub trait HttpProbe {
    /// # Errors
    ///
    /// Returns an error on transport failure (refused, DNS, timeout).
    /// Non-2xx responses are NOT errors; the status code is returned as-is.
    fn get_status(&self, url: &str, timeout: std::time::Duration) -> Result<u16>;
}

// ── Rate limiting ─────────────────────────────────────────────────────────────

/// Explicitly-owned apply-rate ledger.
///
/// Checking and recording are one atomic step: two near-simultaneous
/// invocations must not both pass the check.
pub trait RateLimitStore {
    /// Admit the apply starting at `now`, recording it as a side effect,
    /// or reject it with `EngineError::RateLimitExceeded`.
    ///
    /// # Errors
    ///
    /// `EngineError::RateLimitExceeded` when the trailing window is full;
    /// any other error if the ledger itself cannot be read or written.
    fn check_and_record(&self, now: DateTime<Utc>) -> Result<()>;
}

// ── Progress reporting ────────────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit step-by-step messages
/// without depending on the Presentation layer. Sync trait — no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}

/// Reporter that swallows everything; used by tests and `--quiet` paths.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {
    fn step(&self, _message: &str) {}
    fn success(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
}

/// Engine failures are surfaced through `anyhow`; this helper recovers the
/// typed variant where commands need to distinguish stages.
#[must_use]
pub fn as_engine_error(err: &anyhow::Error) -> Option<&EngineError> {
    err.downcast_ref::<EngineError>()
}
