//! Host service management — systemd units and docker containers.

use anyhow::Result;

use crate::application::ports::ServiceManager;
use crate::command_runner::{CommandRunner, RESTART_TIMEOUT};
use crate::domain::{ServiceKind, ServiceTarget};

/// Production [`ServiceManager`] shelling out to `systemctl` and `docker`.
pub struct HostServiceManager<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> HostServiceManager<R> {
    #[must_use]
    pub fn new(runner: R) -> Self {
        Self { runner }
    }
}

fn systemd_unit(target: &ServiceTarget) -> &str {
    match &target.kind {
        ServiceKind::Systemd { unit } => unit.as_deref().unwrap_or(&target.name),
        ServiceKind::Docker { container } => container,
    }
}

impl<R: CommandRunner> ServiceManager for HostServiceManager<R> {
    async fn restart(&self, target: &ServiceTarget) -> Result<()> {
        let out = match &target.kind {
            ServiceKind::Systemd { .. } => {
                self.runner
                    .run_with_timeout(
                        "systemctl",
                        &["restart", systemd_unit(target)],
                        RESTART_TIMEOUT,
                    )
                    .await?
            }
            ServiceKind::Docker { container } => {
                self.runner
                    .run_with_timeout("docker", &["restart", container], RESTART_TIMEOUT)
                    .await?
            }
        };
        anyhow::ensure!(
            out.status.success(),
            "restarting {} failed: {}",
            target.name,
            String::from_utf8_lossy(&out.stderr).trim()
        );
        Ok(())
    }

    async fn state(&self, target: &ServiceTarget) -> Result<String> {
        let out = match &target.kind {
            ServiceKind::Systemd { .. } => {
                // `is-active` exits non-zero for any state other than
                // "active" but still prints the state; the printed state is
                // the answer either way.
                self.runner
                    .run("systemctl", &["is-active", systemd_unit(target)])
                    .await?
            }
            ServiceKind::Docker { container } => {
                let out = self
                    .runner
                    .run(
                        "docker",
                        &["inspect", "--format", "{{.State.Status}}", container],
                    )
                    .await?;
                anyhow::ensure!(
                    out.status.success(),
                    "inspecting {container} failed: {}",
                    String::from_utf8_lossy(&out.stderr).trim()
                );
                out
            }
        };
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_ascii_lowercase())
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
