//! Manifest schema — the unit of work for one deployment attempt.
//!
//! Pure types and validators only. No I/O, no async, no filesystem access;
//! everything that touches disk lives in `crate::infra`.

use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::error::EngineError;

/// Hard ceiling on individual source file size (1 MiB).
pub const MAX_SOURCE_BYTES: u64 = 1_048_576;

// ── Manifest ─────────────────────────────────────────────────────────────────

/// One deployment attempt: a set of file changes plus post-deploy assertions.
///
/// Written by the Proposal Generator into the staging root, consumed exactly
/// once, then archived by rename. Fields the generator adds beyond the core
/// schema (`proposed_by`, `proposed_at`, `status`) are carried through
/// untouched so the archived copy stays byte-faithful to what was approved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub description: String,
    pub changes: Vec<Change>,
    #[serde(default)]
    pub health_checks: Vec<HealthCheck>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Manifest {
    /// Distinct `restart` targets in first-appearance order.
    #[must_use]
    pub fn restart_targets(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for change in &self.changes {
            if let Some(svc) = change.restart.as_deref() {
                if !seen.contains(&svc) {
                    seen.push(svc);
                }
            }
        }
        seen
    }

    /// Destination paths of every change, in manifest order.
    #[must_use]
    pub fn destinations(&self) -> Vec<&PathBuf> {
        self.changes.iter().map(|c| &c.dest).collect()
    }
}

// ── Change ───────────────────────────────────────────────────────────────────

/// One file operation: copy `source` (relative to the staging root) onto
/// `dest` (absolute host path) with the given ownership and mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Change {
    /// Path relative to the staging root.
    pub source: String,
    /// Absolute destination path on the host.
    pub dest: PathBuf,
    /// `user:group` string. Defaults to `root:root`.
    #[serde(default = "default_owner")]
    pub owner: String,
    /// Octal permission string, e.g. `"0644"`.
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Optional service to restart after this file lands.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart: Option<String>,
}

fn default_owner() -> String {
    "root:root".to_string()
}

fn default_mode() -> String {
    "0644".to_string()
}

impl Change {
    /// Parse `mode` as octal permission bits.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Validation` if the string is not valid octal or
    /// exceeds `0o7777`.
    pub fn mode_bits(&self) -> Result<u32> {
        let bits = u32::from_str_radix(&self.mode, 8)
            .map_err(|_| EngineError::Validation(format!("invalid mode '{}'", self.mode)))?;
        if bits > 0o7777 {
            return Err(EngineError::Validation(format!("invalid mode '{}'", self.mode)).into());
        }
        Ok(bits)
    }

    /// Split `owner` into `(user, group)`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Validation` if the string is not `user:group`
    /// with POSIX-portable names on both sides.
    pub fn owner_parts(&self) -> Result<(&str, &str)> {
        static OWNER_RE: OnceLock<Regex> = OnceLock::new();
        let re = OWNER_RE.get_or_init(|| {
            #[allow(clippy::expect_used)] // pattern is a compile-time constant
            Regex::new(r"^([a-z_][a-z0-9_-]{0,31}):([a-z_][a-z0-9_-]{0,31})$")
                .expect("owner regex is valid")
        });
        let caps = re.captures(&self.owner).ok_or_else(|| {
            EngineError::Validation(format!(
                "invalid owner '{}': expected user:group",
                self.owner
            ))
        })?;
        // Captures 1 and 2 always exist when the pattern matches.
        let user = caps.get(1).map_or("", |m| m.as_str());
        let group = caps.get(2).map_or("", |m| m.as_str());
        Ok((user, group))
    }
}

// ── HealthCheck ──────────────────────────────────────────────────────────────

/// A post-deploy assertion. Immutable once declared in a manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HealthCheck {
    /// Issue a bounded-timeout GET and compare the status code.
    Http { url: String, expect: u16 },
    /// Query the service manager's reported state and compare strings.
    ///
    /// The proposal tooling historically wrote `"systemd"` as the tag;
    /// both spellings deserialize to this variant.
    #[serde(alias = "systemd")]
    ServiceState { service: String, expect: String },
}

impl HealthCheck {
    /// One-line description for log and audit output.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Http { url, expect } => format!("http {url} expect {expect}"),
            Self::ServiceState { service, expect } => {
                format!("service {service} expect {expect}")
            }
        }
    }
}

// ── ApprovalToken ────────────────────────────────────────────────────────────

/// Opaque authorization token handed over by the Approval Gateway.
///
/// The engine records it in the audit log but never interprets it: the
/// gateway performs the actual authorization before invoking us. Requiring
/// it as a parameter keeps that trust boundary visible in the API.
#[derive(Debug, Clone)]
pub struct ApprovalToken(String);

impl ApprovalToken {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn change(owner: &str, mode: &str) -> Change {
        Change {
            source: "app/config.json".to_string(),
            dest: PathBuf::from("/opt/managed/app/config.json"),
            owner: owner.to_string(),
            mode: mode.to_string(),
            restart: None,
        }
    }

    #[test]
    fn test_manifest_parses_core_schema() {
        let raw = r#"{
            "description": "bump poll interval",
            "changes": [
                {"source": "app/config.json", "dest": "/opt/managed/app/config.json",
                 "owner": "svc:svc", "mode": "0644", "restart": "app"}
            ],
            "health_checks": [
                {"type": "http", "url": "http://127.0.0.1:8080/health", "expect": 200},
                {"type": "systemd", "service": "app", "expect": "active"}
            ]
        }"#;
        let m: Manifest = serde_json::from_str(raw).expect("manifest parses");
        assert_eq!(m.description, "bump poll interval");
        assert_eq!(m.changes.len(), 1);
        assert_eq!(m.health_checks.len(), 2);
        assert_eq!(
            m.health_checks[1],
            HealthCheck::ServiceState {
                service: "app".to_string(),
                expect: "active".to_string()
            }
        );
    }

    #[test]
    fn test_manifest_defaults_owner_and_mode() {
        let raw = r#"{"changes": [{"source": "a", "dest": "/opt/managed/a"}]}"#;
        let m: Manifest = serde_json::from_str(raw).expect("manifest parses");
        assert_eq!(m.changes[0].owner, "root:root");
        assert_eq!(m.changes[0].mode, "0644");
        assert!(m.changes[0].restart.is_none());
    }

    #[test]
    fn test_manifest_preserves_generator_extras() {
        let raw = r#"{
            "description": "d", "changes": [], "health_checks": [],
            "proposed_by": "agent", "status": "pending_approval"
        }"#;
        let m: Manifest = serde_json::from_str(raw).expect("manifest parses");
        let back = serde_json::to_value(&m).expect("serializes");
        assert_eq!(back["proposed_by"], "agent");
        assert_eq!(back["status"], "pending_approval");
    }

    #[test]
    fn test_restart_targets_dedupes_in_order() {
        let mut m = Manifest {
            description: String::new(),
            changes: vec![change("root:root", "0644"); 3],
            health_checks: Vec::new(),
            extra: serde_json::Map::new(),
        };
        m.changes[0].restart = Some("beta".to_string());
        m.changes[1].restart = Some("alpha".to_string());
        m.changes[2].restart = Some("beta".to_string());
        assert_eq!(m.restart_targets(), vec!["beta", "alpha"]);
    }

    #[test]
    fn test_mode_bits_parses_octal() {
        assert_eq!(change("root:root", "0644").mode_bits().expect("ok"), 0o644);
        assert_eq!(change("root:root", "0755").mode_bits().expect("ok"), 0o755);
        assert_eq!(change("root:root", "4755").mode_bits().expect("ok"), 0o4755);
    }

    #[test]
    fn test_mode_bits_rejects_garbage() {
        assert!(change("root:root", "rw-r--r--").mode_bits().is_err());
        assert!(change("root:root", "0999").mode_bits().is_err());
        assert!(change("root:root", "77777").mode_bits().is_err());
        assert!(change("root:root", "").mode_bits().is_err());
    }

    #[test]
    fn test_owner_parts_splits_user_group() {
        let ch = change("svc-user:adm_grp", "0644");
        let (user, group) = ch.owner_parts().expect("valid owner");
        assert_eq!(user, "svc-user");
        assert_eq!(group, "adm_grp");
    }

    #[test]
    fn test_owner_parts_rejects_malformed() {
        assert!(change("root", "0644").owner_parts().is_err());
        assert!(change("root:", "0644").owner_parts().is_err());
        assert!(change(":wheel", "0644").owner_parts().is_err());
        assert!(change("Root:Wheel", "0644").owner_parts().is_err());
        assert!(change("a:b:c", "0644").owner_parts().is_err());
    }

    #[test]
    fn test_health_check_describe() {
        let http = HealthCheck::Http {
            url: "http://x/health".to_string(),
            expect: 200,
        };
        assert_eq!(http.describe(), "http http://x/health expect 200");
        let svc = HealthCheck::ServiceState {
            service: "app".to_string(),
            expect: "active".to_string(),
        };
        assert_eq!(svc.describe(), "service app expect active");
    }

    #[test]
    fn test_approval_token_is_opaque_passthrough() {
        let token = ApprovalToken::new("a1b2c3");
        assert_eq!(token.as_str(), "a1b2c3");
    }
}
