//! Engine configuration schema.
//!
//! Loaded from `/etc/confgate/config.yaml` (or `--config <PATH>`). Every
//! field has a serde default so a partial file — or none at all in tests —
//! still yields a usable configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::whitelist::PathWhitelist;

/// Default engine config path on a managed host.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/confgate/config.yaml";

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Staging root holding the pending manifest and source files.
    pub staging_root: PathBuf,
    /// Root holding one timestamped snapshot per apply attempt.
    pub backup_root: PathBuf,
    /// Archive root holding one subtree per completed manifest.
    pub applied_root: PathBuf,
    /// JSONL audit log path.
    pub audit_log: PathBuf,
    pub rate_limit: RateLimitConfig,
    pub backups: BackupConfig,
    pub whitelist: WhitelistConfig,
    pub services: ServicesConfig,
    pub health: HealthConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            staging_root: PathBuf::from("/var/lib/confgate/staging"),
            backup_root: PathBuf::from("/var/lib/confgate/backups"),
            applied_root: PathBuf::from("/var/lib/confgate/applied"),
            audit_log: PathBuf::from("/var/log/confgate/audit.jsonl"),
            rate_limit: RateLimitConfig::default(),
            backups: BackupConfig::default(),
            whitelist: WhitelistConfig::default(),
            services: ServicesConfig::default(),
            health: HealthConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Build the runtime whitelist from the configured entries.
    #[must_use]
    pub fn path_whitelist(&self) -> PathWhitelist {
        PathWhitelist::new(
            self.whitelist.prefixes.clone(),
            self.whitelist.exact.clone(),
        )
    }

    /// Look up a restartable service by its manifest `restart` name.
    #[must_use]
    pub fn restartable(&self, name: &str) -> Option<&ServiceTarget> {
        self.services.restartable.iter().find(|s| s.name == name)
    }
}

/// Apply rate limiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum applies admitted per rolling window.
    pub max_applies: usize,
    /// Rolling window length in minutes.
    pub window_minutes: i64,
    /// Ledger file recording apply timestamps.
    pub ledger: PathBuf,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_applies: 5,
            window_minutes: 60,
            ledger: PathBuf::from("/var/lib/confgate/rate_limit.json"),
        }
    }
}

/// Backup retention policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Keep this many most-recent snapshots; prune the rest oldest-first.
    pub retain: usize,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self { retain: 20 }
    }
}

/// Allowed destination paths. Empty by default: the engine refuses to apply
/// anything until the host operator declares what it may touch.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WhitelistConfig {
    pub prefixes: Vec<PathBuf>,
    pub exact: Vec<PathBuf>,
}

/// Service restart policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// Seconds to wait after the restart batch before health checks run.
    pub settle_seconds: u64,
    /// Fixed allowlist of services this engine may restart.
    pub restartable: Vec<ServiceTarget>,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            settle_seconds: 3,
            restartable: Vec::new(),
        }
    }
}

/// One restartable service and the mechanism that manages it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceTarget {
    /// Name referenced by a manifest change's `restart` field.
    pub name: String,
    #[serde(flatten)]
    pub kind: ServiceKind,
}

/// How a restartable service is managed on the host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ServiceKind {
    /// A systemd unit; `unit` defaults to the service name when omitted.
    Systemd {
        #[serde(default)]
        unit: Option<String>,
    },
    /// A docker container managed outside systemd.
    Docker { container: String },
}

/// Health check execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Hard per-check timeout for HTTP probes, in seconds.
    pub timeout_seconds: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self { timeout_seconds: 10 }
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_spec_ceilings() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.rate_limit.max_applies, 5);
        assert_eq!(cfg.rate_limit.window_minutes, 60);
        assert_eq!(cfg.backups.retain, 20);
        assert_eq!(cfg.services.settle_seconds, 3);
        assert_eq!(cfg.health.timeout_seconds, 10);
        assert!(cfg.path_whitelist().is_empty());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r"
staging_root: /tmp/staging
whitelist:
  prefixes:
    - /opt/managed/
";
        let cfg: EngineConfig = serde_yaml::from_str(yaml).expect("config parses");
        assert_eq!(cfg.staging_root, PathBuf::from("/tmp/staging"));
        assert_eq!(cfg.backup_root, PathBuf::from("/var/lib/confgate/backups"));
        assert_eq!(cfg.rate_limit.max_applies, 5);
        assert!(
            cfg.path_whitelist()
                .allows(std::path::Path::new("/opt/managed/a"))
        );
    }

    #[test]
    fn test_service_targets_parse_both_kinds() {
        let yaml = r"
services:
  settle_seconds: 1
  restartable:
    - name: app
      kind: systemd
    - name: gateway
      kind: docker
      container: gateway-1
";
        let cfg: EngineConfig = serde_yaml::from_str(yaml).expect("config parses");
        assert_eq!(
            cfg.restartable("app").map(|s| &s.kind),
            Some(&ServiceKind::Systemd { unit: None })
        );
        assert_eq!(
            cfg.restartable("gateway").map(|s| &s.kind),
            Some(&ServiceKind::Docker {
                container: "gateway-1".to_string()
            })
        );
        assert!(cfg.restartable("unknown").is_none());
    }
}
