/*! Process identity and lifecycle vocabulary. */

use super::ProcessId;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Lifecycle of an instrumented application process.
///
/// Moves forward only: once `Exited` or `Crashed`, a process never becomes
/// live again. A relaunch is a new process and needs a new attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum LifecycleState {
  Launching,
  Running,
  Suspended,
  Exited,
  Crashed,
}

impl LifecycleState {
  /// Exited or crashed.
  pub const fn is_terminal(self) -> bool {
    matches!(self, Self::Exited | Self::Crashed)
  }

  /// Launching, running or suspended.
  pub const fn is_live(self) -> bool {
    !self.is_terminal()
  }

  /// States in which the process has a screen to capture.
  pub const fn is_capturable(self) -> bool {
    matches!(self, Self::Running | Self::Suspended)
  }
}

/// OS-level notification about the observed process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "camelCase")]
#[ts(export)]
pub enum ProcessEvent {
  /// First activity observed (launch finished) or returned to foreground.
  Activated,
  /// Moved to background.
  Backgrounded,
  /// Returned from background.
  Foregrounded,
  /// Process terminated with an exit code.
  Exited { code: i32 },
  /// A crash report was observed for the process.
  CrashReported,
}

/// What the dispatch layer knows about the process it wants to drive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProcessDescriptor {
  pub bundle_identifier: String,
  /// Bind to this exact process instance, if known.
  pub process_id: Option<ProcessId>,
}

impl ProcessDescriptor {
  pub fn bundle(bundle_identifier: impl Into<String>) -> Self {
    Self {
      bundle_identifier: bundle_identifier.into(),
      process_id: None,
    }
  }

  #[must_use]
  pub const fn with_process_id(mut self, pid: ProcessId) -> Self {
    self.process_id = Some(pid);
    self
  }
}

/// A process discovered by the platform layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProcessInfo {
  pub process_id: ProcessId,
  pub bundle_identifier: String,
  /// Lifecycle at discovery time. Usually `Launching` or `Running`.
  pub lifecycle: LifecycleState,
  /// Older runtimes only report event-loop idleness; on those the
  /// animations-idle signal never arrives.
  pub supports_animations_idle: bool,
}
