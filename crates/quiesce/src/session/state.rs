/*!
Per-attach session state.

Owned by the attach's worker: every method taking `&mut self` runs there, and
the side effects of one notification (lifecycle move, readiness reset, cache
invalidation, events) are applied together before any waiter re-checks.
*/

use async_broadcast::Sender;
use std::sync::Arc;

use crate::process::{ApplicationProcess, Transition};
use crate::quiescence::{Liveness, ReadinessState, ReadinessView};
use crate::snapshot::{Flight, SnapshotSlot, SnapshotView};
use crate::types::{
  AutomationError, AutomationResult, Element, Generation, ProcessEvent, ProcessInfo, ResetReason, SessionEvent,
  SessionToken, Snapshot,
};

/// Broadcast an event, dropping it if nobody is listening.
pub(crate) fn emit(events_tx: &Sender<SessionEvent>, event: SessionEvent) {
  if let Err(e) = events_tx.try_broadcast(event) {
    if e.is_full() {
      log::error!(
        "Event channel overflow - events are being dropped. \
         Consider increasing event_capacity or processing events faster."
      );
    }
  }
}

/// Everything one attach knows. Mutated only on its worker.
pub(crate) struct SessionState {
  token: SessionToken,
  process: ApplicationProcess,
  readiness: ReadinessState,
  snapshot: SnapshotSlot,
  detached: bool,
  supports_animations_idle: bool,
  events_tx: Sender<SessionEvent>,
}

impl SessionState {
  pub(crate) fn new(token: SessionToken, info: &ProcessInfo, events_tx: Sender<SessionEvent>) -> Self {
    Self {
      token,
      process: ApplicationProcess::from_info(info),
      readiness: ReadinessState::default(),
      snapshot: SnapshotSlot::default(),
      detached: false,
      supports_animations_idle: info.supports_animations_idle,
      events_tx,
    }
  }

  /// Whether work tagged with `token` may still change this state.
  pub(crate) fn accepts(&self, token: SessionToken) -> bool {
    !self.detached && self.token == token
  }

  /// Token check for caller operations. Terminated processes still accept,
  /// so each operation can report its own error.
  pub(crate) fn bound(&self, token: SessionToken) -> AutomationResult<()> {
    if self.accepts(token) {
      Ok(())
    } else {
      Err(AutomationError::InvalidSession)
    }
  }

  pub(crate) const fn process(&self) -> &ApplicationProcess {
    &self.process
  }

  pub(crate) const fn liveness(&self) -> Liveness {
    if self.detached {
      Liveness::Detached
    } else if self.process.current_state().is_terminal() {
      Liveness::ProcessGone
    } else {
      Liveness::Live
    }
  }

  /// Resolve a requested mode against what the runtime can deliver.
  pub(crate) const fn effective_animations(&self, requested: bool) -> bool {
    requested && self.supports_animations_idle
  }

  pub(crate) fn on_event_loop_idle(&mut self) {
    if !self.readiness.mark_event_loop_idle() {
      return;
    }
    log::trace!("Event loop idle (generation {})", self.readiness.generation());
    self.emit_quiescent(false);
    if self.supports_animations_idle && self.readiness.is_quiescent(true) {
      self.emit_quiescent(true);
    }
  }

  pub(crate) fn on_animations_idle(&mut self) {
    if !self.readiness.mark_animations_idle() {
      return;
    }
    log::trace!("Animations idle (generation {})", self.readiness.generation());
    if self.readiness.is_quiescent(true) {
      self.emit_quiescent(true);
    }
  }

  pub(crate) fn on_process_event(&mut self, event: ProcessEvent) {
    if let Some(transition) = self.process.observe(event) {
      self.on_transition(transition);
    }
  }

  /// Record a driver-initiated termination. No-op once terminal.
  pub(crate) fn on_terminated(&mut self) {
    if let Some(transition) = self.process.terminate() {
      self.on_transition(transition);
    }
  }

  /// Clear both readiness flags and invalidate the cached tree.
  pub(crate) fn reset_readiness(&mut self, reason: ResetReason) -> Generation {
    let generation = self.readiness.reset();
    log::debug!("Readiness reset to generation {generation} ({reason:?})");
    self.emit(SessionEvent::ReadinessReset { generation, reason });
    self.invalidate_snapshot();
    generation
  }

  /// Returns `true` if a usable tree was dropped.
  pub(crate) fn invalidate_snapshot(&mut self) -> bool {
    let was_valid = self.snapshot.invalidate();
    if was_valid {
      self.emit(SessionEvent::SnapshotInvalidated);
    }
    was_valid
  }

  /// Land a capture started with `flight`. Rejected once detached.
  pub(crate) fn publish_snapshot(
    &mut self,
    flight: Flight,
    captured: AutomationResult<Element>,
  ) -> AutomationResult<Arc<Snapshot>> {
    if self.detached {
      log::debug!("Dropping snapshot capture that landed after detach");
      return Err(AutomationError::InvalidSession);
    }
    let result = self.snapshot.publish(
      flight,
      captured,
      self.process.process_id(),
      self.readiness.generation(),
    );
    match &result {
      Ok(snapshot) => {
        log::debug!(
          "Snapshot v{} captured ({} elements)",
          snapshot.version,
          snapshot.root.descendant_count() + 1
        );
        self.emit(SessionEvent::SnapshotCaptured {
          version: snapshot.version,
        });
      }
      Err(e) => log::warn!("Snapshot capture failed: {e}"),
    }
    result
  }

  pub(crate) fn snapshot_slot_mut(&mut self) -> &mut SnapshotSlot {
    &mut self.snapshot
  }

  /// Tear down. Wakes every waiter with `InvalidSession`.
  pub(crate) fn detach(&mut self) {
    if self.detached {
      return;
    }
    self.detached = true;
    self.snapshot.clear();
    self.emit(SessionEvent::Detached { token: self.token });
  }

  fn on_transition(&mut self, transition: Transition) {
    self.emit(SessionEvent::LifecycleChanged {
      from: transition.from,
      to: transition.to,
    });
    self.reset_readiness(ResetReason::Lifecycle);
  }

  fn emit_quiescent(&self, includes_animations: bool) {
    self.emit(SessionEvent::Quiescent {
      generation: self.readiness.generation(),
      includes_animations,
    });
  }

  fn emit(&self, event: SessionEvent) {
    emit(&self.events_tx, event);
  }
}

impl ReadinessView for SessionState {
  fn readiness(&self) -> &ReadinessState {
    &self.readiness
  }

  fn readiness_mut(&mut self) -> &mut ReadinessState {
    &mut self.readiness
  }

  fn liveness(&self) -> Liveness {
    Self::liveness(self)
  }
}

impl SnapshotView for SessionState {
  fn snapshot_slot(&self) -> &SnapshotSlot {
    &self.snapshot
  }

  fn snapshot_slot_mut(&mut self) -> &mut SnapshotSlot {
    Self::snapshot_slot_mut(self)
  }

  fn liveness(&self) -> Liveness {
    Self::liveness(self)
  }
}
