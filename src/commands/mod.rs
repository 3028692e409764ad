//! Command implementations

pub mod apply;
pub mod history;
pub mod rollback;
pub mod status;

use std::path::Path;

use anyhow::{Context, Result};

use crate::domain::EngineConfig;
use crate::domain::config::DEFAULT_CONFIG_PATH;

/// Load the engine configuration.
///
/// An explicit `--config` path must exist; the default path may be absent,
/// in which case built-in defaults apply (useful on a freshly provisioned
/// host before the operator has written a config).
///
/// # Errors
///
/// Returns an error if an explicitly given path is missing, or if any
/// config file fails to parse.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let (path, required) = match path {
        Some(p) => (p, true),
        None => (Path::new(DEFAULT_CONFIG_PATH), false),
    };
    if !path.exists() {
        if required {
            anyhow::bail!("config file not found: {}", path.display());
        }
        return Ok(EngineConfig::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_yaml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
}

// ── Unit tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_explicit_path_must_exist() {
        let dir = TempDir::new().expect("tempdir");
        let missing = dir.path().join("nope.yaml");
        assert!(load_config(Some(&missing)).is_err());
    }

    #[test]
    fn test_load_config_parses_yaml() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "backups:\n  retain: 7\n").expect("write");
        let cfg = load_config(Some(&path)).expect("parses");
        assert_eq!(cfg.backups.retain, 7);
    }

    #[test]
    fn test_load_config_rejects_bad_yaml() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "backups: [not a map").expect("write");
        assert!(load_config(Some(&path)).is_err());
    }
}
