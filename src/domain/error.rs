//! Typed engine error taxonomy.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use thiserror::Error;

/// Failure modes of one apply/rollback invocation, in pipeline order.
///
/// `Validation` and `RateLimitExceeded` are raised before any mutation and
/// leave the host untouched. `Backup` and `Write` abort mid-flight and may
/// leave a partial snapshot behind for manual inspection. `HealthCheck` is
/// the only variant with an automated recovery path (rollback). `Rollback`
/// means the engine has exhausted its own recovery options.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("rate limit exceeded: {count} applies in the last {window_minutes} minutes (max {max})")]
    RateLimitExceeded {
        count: usize,
        max: usize,
        window_minutes: i64,
    },

    #[error("backup failed: {0}")]
    Backup(String),

    #[error("write failed: {0}")]
    Write(String),

    #[error("health check failed: {0}")]
    HealthCheck(String),

    #[error("rollback failed, manual intervention required: {0}")]
    Rollback(String),
}

impl EngineError {
    /// Short machine-readable stage name for the structured result line.
    #[must_use]
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::RateLimitExceeded { .. } => "rate_limit",
            Self::Backup(_) => "backup",
            Self::Write(_) => "write",
            Self::HealthCheck(_) => "health_check",
            Self::Rollback(_) => "rollback",
        }
    }

    /// Whether this failure occurred before any destination was modified.
    #[must_use]
    pub fn pre_mutation(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::RateLimitExceeded { .. } | Self::Backup(_)
        )
    }
}
