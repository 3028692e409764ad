//! Content validation — per-role syntax and semantic checks.
//!
//! Each destination maps to a [`ContentRole`]; the role decides which checker
//! runs and whether its failure is fatal. External checkers are invoked
//! through [`CommandRunner`] so they can be mocked; a checker that is not
//! installed on the host downgrades to a warning — availability of a checker
//! must never become a hard dependency.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};

use crate::command_runner::CommandRunner;
use crate::domain::{EngineError, MAX_SOURCE_BYTES};

/// How far into a file to look for NUL bytes when sniffing for binary
/// content.
const SNIFF_BYTES: usize = 8192;

/// Destination content kinds with distinct validation strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentRole {
    /// systemd unit files — `systemd-analyze verify`, failure non-fatal.
    SystemdUnit,
    /// `.json` — must parse as well-formed JSON, failure fatal.
    StructuredConfig,
    /// docker compose files — `docker compose config -q`, failure non-fatal.
    Compose,
    /// `.sh` — `bash -n`, syntax failure fatal.
    ShellScript,
    /// `.py` — `python3 -m py_compile`, syntax failure fatal.
    PythonScript,
    /// Everything else — text/size checks only.
    Plain,
}

/// Outcome of a non-fatal-capable check. Fatal problems are returned as
/// `EngineError::Validation` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    Warning(String),
}

/// Derive the validation role from the destination path.
#[must_use]
pub fn role_for(dest: &Path) -> ContentRole {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if matches!(
        name.as_str(),
        "docker-compose.yml" | "docker-compose.yaml" | "compose.yml" | "compose.yaml"
    ) {
        return ContentRole::Compose;
    }
    if name.ends_with(".service") || name.ends_with(".timer") || name.ends_with(".socket") {
        return ContentRole::SystemdUnit;
    }
    if dest.starts_with("/etc/systemd") {
        return ContentRole::SystemdUnit;
    }
    if name.ends_with(".json") {
        return ContentRole::StructuredConfig;
    }
    if name.ends_with(".sh") {
        return ContentRole::ShellScript;
    }
    if name.ends_with(".py") {
        return ContentRole::PythonScript;
    }
    ContentRole::Plain
}

impl ContentRole {
    /// Run this role's content check against a staged source file.
    ///
    /// # Errors
    ///
    /// `EngineError::Validation` for fatal problems (bad JSON, script syntax
    /// errors); infrastructure errors only if the source itself cannot be
    /// read.
    pub async fn validate(self, runner: &impl CommandRunner, source: &Path) -> Result<Verdict> {
        match self {
            Self::SystemdUnit => {
                advisory_check(runner, "systemd-analyze", &["verify"], source).await
            }
            Self::Compose => {
                let path = source.to_string_lossy();
                match runner
                    .run("docker", &["compose", "-f", &path, "config", "-q"])
                    .await
                {
                    Ok(out) if out.status.success() => Ok(Verdict::Passed),
                    Ok(out) => Ok(Verdict::Warning(format!(
                        "compose config check failed for {}: {}",
                        source.display(),
                        String::from_utf8_lossy(&out.stderr).trim()
                    ))),
                    Err(err) => Ok(Verdict::Warning(format!(
                        "compose config check unavailable: {err}"
                    ))),
                }
            }
            Self::StructuredConfig => {
                let content = std::fs::read_to_string(source)
                    .with_context(|| format!("reading {}", source.display()))?;
                match serde_json::from_str::<serde_json::Value>(&content) {
                    Ok(_) => Ok(Verdict::Passed),
                    Err(err) => Err(EngineError::Validation(format!(
                        "invalid JSON in {}: {err}",
                        source.display()
                    ))
                    .into()),
                }
            }
            Self::ShellScript => strict_check(runner, "bash", &["-n"], source).await,
            Self::PythonScript => {
                strict_check(runner, "python3", &["-m", "py_compile"], source).await
            }
            Self::Plain => Ok(Verdict::Passed),
        }
    }
}

/// Checker whose failure is logged but never blocks the apply.
async fn advisory_check(
    runner: &impl CommandRunner,
    program: &str,
    args: &[&str],
    source: &Path,
) -> Result<Verdict> {
    let path = source.to_string_lossy();
    let mut full_args: Vec<&str> = args.to_vec();
    full_args.push(&path);
    match runner.run(program, &full_args).await {
        Ok(out) if out.status.success() => Ok(Verdict::Passed),
        Ok(out) => Ok(Verdict::Warning(format!(
            "{program} reported problems for {}: {}",
            source.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        ))),
        Err(err) => Ok(Verdict::Warning(format!("{program} unavailable: {err}"))),
    }
}

/// Checker whose non-zero exit is fatal; only its *absence* downgrades to a
/// warning.
async fn strict_check(
    runner: &impl CommandRunner,
    program: &str,
    args: &[&str],
    source: &Path,
) -> Result<Verdict> {
    let path = source.to_string_lossy();
    let mut full_args: Vec<&str> = args.to_vec();
    full_args.push(&path);
    match runner.run(program, &full_args).await {
        Ok(out) if out.status.success() => Ok(Verdict::Passed),
        Ok(out) => Err(EngineError::Validation(format!(
            "{program} syntax check failed for {}: {}",
            source.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        ))
        .into()),
        Err(err) => Ok(Verdict::Warning(format!("{program} unavailable: {err}"))),
    }
}

/// Reject oversized and binary sources before any per-role check runs.
///
/// # Errors
///
/// `EngineError::Validation` if the source is missing, not a regular file,
/// larger than 1 MiB, or sniffs as binary (NUL byte in the first 8 KiB).
pub fn check_text_and_size(source: &Path) -> Result<u64> {
    let meta = std::fs::metadata(source).map_err(|_| {
        EngineError::Validation(format!("source missing: {}", source.display()))
    })?;
    if !meta.is_file() {
        return Err(
            EngineError::Validation(format!("source is not a regular file: {}", source.display()))
                .into(),
        );
    }
    if meta.len() > MAX_SOURCE_BYTES {
        return Err(EngineError::Validation(format!(
            "source too large: {} ({} bytes, max {MAX_SOURCE_BYTES})",
            source.display(),
            meta.len()
        ))
        .into());
    }

    let mut file =
        std::fs::File::open(source).with_context(|| format!("opening {}", source.display()))?;
    let mut buf = vec![0u8; SNIFF_BYTES];
    let n = file
        .read(&mut buf)
        .with_context(|| format!("reading {}", source.display()))?;
    if buf[..n].contains(&0) {
        return Err(EngineError::Validation(format!(
            "binary content rejected: {}",
            source.display()
        ))
        .into());
    }
    Ok(meta.len())
}

// ── Unit tests ───────────────────────────────────────────────────────────────
