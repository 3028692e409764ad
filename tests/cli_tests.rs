//! Integration tests for the confgate CLI surface.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn confgate() -> Command {
    let mut cmd = Command::cargo_bin("confgate").expect("confgate binary should exist");
    // A leaked token in the test environment must not satisfy --token.
    cmd.env_remove("CONFGATE_APPROVAL_TOKEN");
    cmd
}

/// Write a config whose roots all live inside `dir`, so commands never
/// touch the host's real /var/lib paths.
fn temp_config(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("config.yaml");
    let yaml = format!(
        "staging_root: {base}/staging\n\
         backup_root: {base}/backups\n\
         applied_root: {base}/applied\n\
         audit_log: {base}/audit.jsonl\n\
         rate_limit:\n  ledger: {base}/rate_limit.json\n\
         whitelist:\n  prefixes:\n    - {base}/managed\n",
        base = dir.path().display()
    );
    std::fs::write(&path, yaml).expect("write config");
    path
}

// --- Help and version tests ---

#[test]
fn test_cli_no_args_shows_help_and_exits_two() {
    confgate()
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Gated configuration deployment"));
}

#[test]
fn test_cli_help_flag_shows_help() {
    confgate()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("Commands:"));
}

#[test]
fn test_cli_version_flag_shows_version() {
    confgate()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("confgate"));
}

// --- Command hierarchy tests ---

#[test]
fn test_help_shows_all_commands() {
    confgate()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("apply"))
        .stdout(predicate::str::contains("rollback"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("history"));
}

#[test]
fn test_unknown_command_exits_with_error() {
    confgate()
        .arg("nonexistent")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

// --- Argument validation tests ---

#[test]
fn test_apply_requires_token() {
    confgate()
        .arg("apply")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--token"));
}

#[test]
fn test_rollback_requires_token() {
    confgate()
        .arg("rollback")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--token"));
}

#[test]
fn test_explicit_missing_config_is_an_error() {
    confgate()
        .args(["--config", "/nonexistent/config.yaml", "status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config file not found"));
}

// --- Read-only commands against an empty engine ---

#[test]
fn test_status_json_on_empty_engine() {
    let dir = TempDir::new().expect("tempdir");
    let config = temp_config(&dir);
    confgate()
        .args(["--config", config.to_str().expect("utf8"), "--json", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""pending":null"#))
        .stdout(predicate::str::contains(r#""backups":0"#));
}

#[test]
fn test_status_human_output_on_empty_engine() {
    let dir = TempDir::new().expect("tempdir");
    let config = temp_config(&dir);
    confgate()
        .args(["--config", config.to_str().expect("utf8"), "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pending"))
        .stdout(predicate::str::contains("never"));
}

#[test]
fn test_history_json_on_empty_engine() {
    let dir = TempDir::new().expect("tempdir");
    let config = temp_config(&dir);
    confgate()
        .args(["--config", config.to_str().expect("utf8"), "--json", "history"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}

// --- Failure surfaces ---

#[test]
fn test_apply_with_nothing_staged_fails_at_validation() {
    let dir = TempDir::new().expect("tempdir");
    let config = temp_config(&dir);
    confgate()
        .args([
            "--config",
            config.to_str().expect("utf8"),
            "--json",
            "apply",
            "--token",
            "tok-123",
        ])
        .assert()
        .failure()
        .stdout(predicate::str::contains(r#""status":"failed"#))
        .stdout(predicate::str::contains(r#""stage":"validation"#))
        .stdout(predicate::str::contains("no pending proposal"));
}

#[test]
fn test_rollback_with_no_snapshots_fails() {
    let dir = TempDir::new().expect("tempdir");
    let config = temp_config(&dir);
    confgate()
        .args([
            "--config",
            config.to_str().expect("utf8"),
            "rollback",
            "--token",
            "tok-123",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no snapshots"));
}

#[test]
fn test_rollback_named_snapshot_must_exist() {
    let dir = TempDir::new().expect("tempdir");
    let config = temp_config(&dir);
    confgate()
        .args([
            "--config",
            config.to_str().expect("utf8"),
            "rollback",
            "--token",
            "tok-123",
            "--backup",
            "20990101T000000Z",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no such snapshot"));
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod proptests {
    use super::{confgate, temp_config};
    use proptest::prelude::*;
    use tempfile::TempDir;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        /// Any unknown command should fail with an error.
        #[test]
        fn prop_unknown_command_fails(cmd in "[a-z]{3,10}") {
            let known = ["apply", "rollback", "status", "history", "help"];
            if known.contains(&cmd.as_str()) {
                return Ok(());
            }
            confgate().arg(&cmd).assert().failure();
        }

        /// Global flags can be placed before any command.
        #[test]
        fn prop_global_flags_before_status(
            json in proptest::bool::ANY,
            quiet in proptest::bool::ANY,
            no_color in proptest::bool::ANY,
        ) {
            let dir = TempDir::new().expect("tempdir");
            let config = temp_config(&dir);
            let mut cmd = confgate();
            cmd.args(["--config", config.to_str().expect("utf8")]);
            if json { cmd.arg("--json"); }
            if quiet { cmd.arg("--quiet"); }
            if no_color { cmd.arg("--no-color"); }
            cmd.arg("status");
            cmd.assert().success();
        }
    }
}
