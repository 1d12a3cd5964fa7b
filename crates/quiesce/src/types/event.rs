/*! Events broadcast to session subscribers. */

use super::{Generation, LifecycleState, ProcessId, SessionToken, SnapshotVersion};
use serde::Serialize;
use ts_rs::TS;

/// Why readiness was reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum ResetReason {
  /// The process changed lifecycle state.
  Lifecycle,
  /// A command is about to mutate the UI.
  Command,
}

/// Events emitted when session state changes.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(tag = "event", content = "data")]
#[ts(export)]
pub enum SessionEvent {
  #[serde(rename = "session:attached")]
  Attached {
    token: SessionToken,
    process_id: ProcessId,
  },
  #[serde(rename = "session:detached")]
  Detached { token: SessionToken },

  #[serde(rename = "process:lifecycle")]
  LifecycleChanged {
    from: LifecycleState,
    to: LifecycleState,
  },

  #[serde(rename = "readiness:reset")]
  ReadinessReset {
    generation: Generation,
    reason: ResetReason,
  },
  #[serde(rename = "readiness:quiescent")]
  Quiescent {
    generation: Generation,
    /// False when only the event loop is required to idle.
    includes_animations: bool,
  },

  #[serde(rename = "snapshot:captured")]
  SnapshotCaptured { version: SnapshotVersion },
  #[serde(rename = "snapshot:invalidated")]
  SnapshotInvalidated,
}
