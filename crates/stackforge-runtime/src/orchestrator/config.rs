//! Orchestrator tuning knobs.

use std::time::Duration;

/// Timing and lookup configuration shared by every orchestrator.
///
/// Tests shrink the durations; production uses the defaults.
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Backoff between provisioning attempts while the sandbox image builds.
    pub boot_retry: Duration,
    /// Period of the sandbox liveness poll once the sandbox is up.
    pub liveness_interval: Duration,
    /// Backoff after an unexpected lifecycle error before re-provisioning.
    pub error_retry: Duration,
    /// Idle window after which the sweeper kills an orchestrator.
    pub idle_after: Duration,
    /// Sandbox-relative path of the change-log snapshot.
    pub change_log_path: String,
    /// Tunnel port whose URL is surfaced as the preview link.
    pub preview_port: u16,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            boot_retry: Duration::from_secs(10),
            liveness_interval: Duration::from_secs(30),
            error_retry: Duration::from_secs(30),
            idle_after: Duration::from_secs(30 * 60),
            change_log_path: "git.log".to_string(),
            preview_port: 3000,
        }
    }
}
