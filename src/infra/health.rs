//! Post-deploy health checks — HTTP status and service state assertions.
//!
//! Pure read-only evaluation: nothing here mutates the host. Every declared
//! check runs even after the first failure so the audit log shows the full
//! picture of what broke.

use std::time::Duration;

use anyhow::Result;

use crate::application::ports::{HttpProbe, ServiceManager};
use crate::domain::{EngineConfig, HealthCheck};

/// Production [`HttpProbe`] — blocking `ureq` GET with a per-request timeout.
pub struct UreqHttpProbe;

impl HttpProbe for UreqHttpProbe {
    fn get_status(&self, url: &str, timeout: Duration) -> Result<u16> {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        match agent.get(url).call() {
            Ok(resp) => Ok(resp.status()),
            // Non-2xx is a real answer, not a transport failure.
            Err(ureq::Error::Status(code, _)) => Ok(code),
            Err(err) => anyhow::bail!("request to {url} failed: {err}"),
        }
    }
}

/// Outcome of one declared check.
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub description: String,
    pub passed: bool,
    pub detail: String,
}

/// Evaluates a manifest's declared checks against the live host.
pub struct HealthChecker<'a, H: HttpProbe, S: ServiceManager> {
    http: &'a H,
    services: &'a S,
    config: &'a EngineConfig,
}

impl<'a, H: HttpProbe, S: ServiceManager> HealthChecker<'a, H, S> {
    #[must_use]
    pub fn new(http: &'a H, services: &'a S, config: &'a EngineConfig) -> Self {
        Self {
            http,
            services,
            config,
        }
    }

    /// Evaluate every declared check. The overall result passes only if all
    /// individual checks pass.
    ///
    /// # Errors
    ///
    /// Individual check failures are reported in the returned list, not as
    /// errors; this returns `Err` only on internal invariant violations
    /// (none today).
    pub async fn evaluate(&self, checks: &[HealthCheck]) -> Result<Vec<CheckReport>> {
        let timeout = Duration::from_secs(self.config.health.timeout_seconds);
        let mut reports = Vec::with_capacity(checks.len());
        for check in checks {
            let report = match check {
                HealthCheck::Http { url, expect } => match self.http.get_status(url, timeout) {
                    Ok(status) if status == *expect => CheckReport {
                        description: check.describe(),
                        passed: true,
                        detail: format!("status {status}"),
                    },
                    Ok(status) => CheckReport {
                        description: check.describe(),
                        passed: false,
                        detail: format!("status {status}, expected {expect}"),
                    },
                    Err(err) => CheckReport {
                        description: check.describe(),
                        passed: false,
                        detail: err.to_string(),
                    },
                },
                HealthCheck::ServiceState { service, expect } => {
                    match self.config.restartable(service) {
                        Some(target) => match self.services.state(target).await {
                            Ok(state) if state == expect.to_ascii_lowercase() => CheckReport {
                                description: check.describe(),
                                passed: true,
                                detail: format!("state {state}"),
                            },
                            Ok(state) => CheckReport {
                                description: check.describe(),
                                passed: false,
                                detail: format!("state {state}, expected {expect}"),
                            },
                            Err(err) => CheckReport {
                                description: check.describe(),
                                passed: false,
                                detail: err.to_string(),
                            },
                        },
                        None => CheckReport {
                            description: check.describe(),
                            passed: false,
                            detail: format!("service {service} is not in the allowlist"),
                        },
                    }
                }
            };
            reports.push(report);
        }
        Ok(reports)
    }
}

/// Join the failing reports into one message, or `None` when all passed.
#[must_use]
pub fn failure_summary(reports: &[CheckReport]) -> Option<String> {
    let failures: Vec<String> = reports
        .iter()
        .filter(|r| !r.passed)
        .map(|r| format!("{}: {}", r.description, r.detail))
        .collect();
    if failures.is_empty() {
        None
    } else {
        Some(failures.join("; "))
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
