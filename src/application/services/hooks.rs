//! Lifecycle hook execution inside target containers.
//!
//! Each hook is an operator-defined shell command run inside the container
//! under a time budget. The exec round-trip runs on the runtime port while
//! this module races it against the timeout and the pass-level cancellation
//! signal; a slow or hung hook must never block the orchestration pass
//! beyond its configured budget.

use std::collections::HashMap;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::application::ports::ExecRunner;
use crate::domain::LifecycleHook;
use crate::domain::labels::{hook_timeout, lifecycle_command};

/// Reserved exit code a hook returns to request "skip this update".
pub const SKIP_UPDATE_EXIT_CODE: i64 = 75;

/// Default time budget for every hook point.
pub const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(60);

/// Classified outcome of one hook invocation.
#[derive(Debug, Clone, Default)]
pub struct HookResult {
    /// `false` when no command was configured for this hook point.
    pub executed: bool,
    /// `true` when the hook exited with the reserved skip sentinel.
    pub skip_update: bool,
    /// Exit code, when the execution completed.
    pub exit_code: Option<i64>,
    /// Captured combined output.
    pub output: String,
    /// Failure description: non-zero non-sentinel exit, timeout, or exec
    /// transport error.
    pub error: Option<String>,
}

impl HookResult {
    fn not_configured() -> Self {
        Self::default()
    }

    /// `true` when the hook ran and neither failed nor requested a skip.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.executed || (self.error.is_none() && !self.skip_update)
    }
}

/// Run one lifecycle hook for a container.
///
/// Absent or blank hook labels return immediately with `executed = false` —
/// that is not a failure. Timeout and cancellation are reported as the
/// execution's error without consulting the exit code; the in-container
/// process is not cancelled out-of-band.
pub async fn run_hook(
    exec: &impl ExecRunner,
    hook: LifecycleHook,
    container_id: &str,
    labels: &HashMap<String, String>,
    cancel: &CancellationToken,
) -> HookResult {
    let Some(cmd) = lifecycle_command(labels, hook.command_label()) else {
        return HookResult::not_configured();
    };

    let timeout = hook
        .timeout_label()
        .map_or(DEFAULT_HOOK_TIMEOUT, |label| {
            hook_timeout(labels, label, DEFAULT_HOOK_TIMEOUT)
        });

    debug!(
        container = %container_id,
        hook = hook.name(),
        timeout_secs = timeout.as_secs(),
        "running lifecycle hook"
    );

    tokio::select! {
        outcome = exec.exec(container_id, &cmd) => match outcome {
            Ok(outcome) => classify(hook, outcome.exit_code, outcome.output),
            Err(err) => HookResult {
                executed: true,
                error: Some(format!("{} hook execution failed: {err:#}", hook.name())),
                ..Default::default()
            },
        },
        () = tokio::time::sleep(timeout) => HookResult {
            executed: true,
            error: Some(format!(
                "lifecycle command timed out after {}s",
                timeout.as_secs()
            )),
            ..Default::default()
        },
        () = cancel.cancelled() => HookResult {
            executed: true,
            error: Some("lifecycle command cancelled before completion".to_owned()),
            ..Default::default()
        },
    }
}

fn classify(hook: LifecycleHook, exit_code: i64, output: String) -> HookResult {
    match exit_code {
        SKIP_UPDATE_EXIT_CODE => HookResult {
            executed: true,
            skip_update: true,
            exit_code: Some(exit_code),
            output,
            error: None,
        },
        0 => HookResult {
            executed: true,
            skip_update: false,
            exit_code: Some(0),
            output,
            error: None,
        },
        code => HookResult {
            executed: true,
            skip_update: false,
            exit_code: Some(code),
            error: Some(format!(
                "{} hook exited with code {code}: {}",
                hook.name(),
                output.trim()
            )),
            output,
        },
    }
}
