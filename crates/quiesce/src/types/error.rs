/*! Error types for automation session operations. */

use super::{LifecycleState, ProcessId};
use std::time::Duration;

/// Errors returned by session operations.
///
/// The core never retries on the caller's behalf; each variant tells the
/// command-dispatch layer what it may do next.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AutomationError {
  /// Readiness was not reached within the wait budget.
  #[error("UI did not become quiescent within {waited:?}")]
  Timeout { waited: Duration },

  /// The process exited or crashed. Terminal for the session.
  #[error("Application process is gone")]
  ProcessGone,

  /// The token does not belong to the live attach.
  #[error("Session token is invalid or has been superseded")]
  InvalidSession,

  #[error("Process not found: {0}")]
  ProcessNotFound(String),

  #[error("Already attached to process {0}")]
  AlreadyAttached(ProcessId),

  #[error("Screenshot unavailable while process is {0:?}")]
  CaptureUnavailable(LifecycleState),

  #[error("Screenshot encoding failed: {0}")]
  EncodingFailed(String),

  #[error("Accessibility snapshot failed: {0}")]
  SnapshotFailed(String),

  #[error("Internal error: {0}")]
  Internal(String),
}

impl AutomationError {
  /// Failures the caller may retry, with a longer budget or as-is.
  pub const fn is_recoverable(&self) -> bool {
    matches!(
      self,
      Self::Timeout { .. }
        | Self::CaptureUnavailable(_)
        | Self::EncodingFailed(_)
        | Self::SnapshotFailed(_)
    )
  }

  /// Failures after which the caller must detach and attach again.
  pub const fn is_session_terminal(&self) -> bool {
    matches!(self, Self::ProcessGone | Self::InvalidSession)
  }
}

/// Result type for session operations.
pub type AutomationResult<T> = Result<T, AutomationError>;
