/*!
Process state model.

Authoritative record of one instrumented application process. Mutated only on
the session worker; everything else reads copies.

## Transition table

| event           | from                   | to         |
|-----------------|------------------------|------------|
| `Activated`     | Launching / Suspended  | Running    |
| `Backgrounded`  | Running                | Suspended  |
| `Foregrounded`  | Suspended              | Running    |
| `Exited`        | any live               | Exited     |
| `CrashReported` | any live / Exited      | Crashed    |

Anything else is ignored. Terminal states never go back to a live state.
A crash report observed after an exit wins: the process ends `Crashed` with
the exit code retained.
*/

use crate::types::{LifecycleState, ProcessEvent, ProcessId, ProcessInfo};
use serde::Serialize;

/// A lifecycle change produced by [`ApplicationProcess::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Transition {
  pub(crate) from: LifecycleState,
  pub(crate) to: LifecycleState,
}

/// Snapshot of everything known about the attached process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationProcess {
  process_id: ProcessId,
  bundle_identifier: String,
  lifecycle: LifecycleState,
  exit_code: Option<i32>,
  has_crash_report: bool,
}

impl ApplicationProcess {
  pub(crate) fn from_info(info: &ProcessInfo) -> Self {
    Self {
      process_id: info.process_id,
      bundle_identifier: info.bundle_identifier.clone(),
      lifecycle: info.lifecycle,
      exit_code: None,
      has_crash_report: info.lifecycle == LifecycleState::Crashed,
    }
  }

  pub const fn process_id(&self) -> ProcessId {
    self.process_id
  }

  pub fn bundle_identifier(&self) -> &str {
    &self.bundle_identifier
  }

  pub const fn current_state(&self) -> LifecycleState {
    self.lifecycle
  }

  /// Exit code, once the process has exited.
  pub const fn exit_code(&self) -> Option<i32> {
    self.exit_code
  }

  /// Once true, stays true.
  pub const fn has_crash_report(&self) -> bool {
    self.has_crash_report
  }

  /// Apply an OS notification. Returns the transition if the lifecycle moved.
  pub(crate) fn observe(&mut self, event: ProcessEvent) -> Option<Transition> {
    use LifecycleState::{Crashed, Exited, Launching, Running, Suspended};

    let next = match (self.lifecycle, event) {
      (Launching | Suspended, ProcessEvent::Activated) | (Suspended, ProcessEvent::Foregrounded) => {
        Some(Running)
      }
      (Running, ProcessEvent::Backgrounded) => Some(Suspended),
      (Launching | Running | Suspended, ProcessEvent::Exited { code }) => {
        self.record_exit_code(code);
        Some(Exited)
      }
      (Crashed, ProcessEvent::Exited { code }) => {
        self.record_exit_code(code);
        None
      }
      (_, ProcessEvent::CrashReported) => {
        self.has_crash_report = true;
        (self.lifecycle != Crashed).then_some(Crashed)
      }
      (Running, ProcessEvent::Activated | ProcessEvent::Foregrounded)
      | (
        Exited | Crashed,
        ProcessEvent::Activated | ProcessEvent::Backgrounded | ProcessEvent::Foregrounded,
      )
      | (Launching, ProcessEvent::Backgrounded | ProcessEvent::Foregrounded)
      | (Suspended, ProcessEvent::Backgrounded)
      | (Exited, ProcessEvent::Exited { .. }) => None,
    };

    match next {
      Some(to) => Some(self.move_to(to)),
      None => {
        log::trace!(
          "Process {}: {event:?} ignored in {:?}",
          self.process_id,
          self.lifecycle
        );
        None
      }
    }
  }

  /// Mark the process terminated by the driver. No-op when already terminal.
  pub(crate) fn terminate(&mut self) -> Option<Transition> {
    if self.lifecycle.is_terminal() {
      return None;
    }
    Some(self.move_to(LifecycleState::Exited))
  }

  fn record_exit_code(&mut self, code: i32) {
    if self.exit_code.is_none() {
      self.exit_code = Some(code);
    }
  }

  fn move_to(&mut self, to: LifecycleState) -> Transition {
    let from = self.lifecycle;
    self.lifecycle = to;
    log::debug!("Process {}: {from:?} -> {to:?}", self.process_id);
    Transition { from, to }
  }
}
