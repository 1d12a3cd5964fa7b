/*!
Readiness signal bus.

The instrumented process reports readiness and lifecycle changes
asynchronously, from whatever thread the device layer happens to run on.
[`ReadinessSender`] is the only way those notifications reach session state:
every call is queued onto the attach's worker and applied there in arrival
order.

A sender is bound to one attach. Once that attach is detached or superseded
its sends are dropped, so a late notification from a previous process
instance can never touch a newer one.
*/

use crate::session::SessionState;
use crate::types::{ProcessEvent, SessionToken};
use crate::worker::WorkerHandle;

/// Cloneable sink for notifications from one attached process.
#[derive(Clone, Debug)]
pub struct ReadinessSender {
  handle: WorkerHandle<SessionState>,
  token: SessionToken,
}

impl ReadinessSender {
  pub(crate) const fn new(handle: WorkerHandle<SessionState>, token: SessionToken) -> Self {
    Self { handle, token }
  }

  /// The attach this sender delivers to.
  pub const fn token(&self) -> SessionToken {
    self.token
  }

  /// The main event loop has no pending work.
  pub fn event_loop_idle(&self) {
    self.send("event loop idle", SessionState::on_event_loop_idle);
  }

  /// All running animations have finished.
  pub fn animations_idle(&self) {
    self.send("animations idle", SessionState::on_animations_idle);
  }

  /// OS-level lifecycle notification.
  pub fn process_event(&self, event: ProcessEvent) {
    self.send("process event", move |state| state.on_process_event(event));
  }

  fn send(&self, what: &'static str, apply: impl FnOnce(&mut SessionState) + Send + 'static) {
    let token = self.token;
    let queued = self.handle.post(move |state| {
      if state.accepts(token) {
        apply(state);
      } else {
        log::debug!("Dropping {what} for detached session {token}");
      }
    });
    if !queued {
      log::debug!("Dropping {what} for detached session {token}");
    }
  }
}
