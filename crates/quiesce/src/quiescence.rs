/*!
Quiescence detection.

Answers "is the UI safe to touch" from two asynchronous signals delivered by
the instrumented process: the main event loop went idle, and running
animations finished. Older runtimes only deliver the first, so the detector
runs in one of two modes selected per wait by `include_animations`:

- single-signal: quiescent once the event loop is idle
- dual-signal: quiescent once both the event loop and animations are idle

## Generations

Every reset clears both flags and bumps the [`Generation`] in the same step.
Because flags are only ever set and cleared under the state lock, a waiter
that sees the required flags set is looking at a single generation: a reset
racing with the last `mark_*` either lands before it (and the flags read false)
or after it (and the waiter was already released). A waiter that notices the
generation moved simply adopts the new one and keeps waiting against its
original deadline.

No polling: waiters park on the worker's condition variable and only re-check
when a job has been applied.
*/

use serde::Serialize;
use std::time::{Duration, Instant};
use ts_rs::TS;

use crate::types::{AutomationError, AutomationResult, Generation};
use crate::worker::Shared;

/// Whether the attach a waiter is bound to can still become quiescent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Liveness {
  Live,
  /// The process exited or crashed.
  ProcessGone,
  /// The attach was torn down.
  Detached,
}

impl Liveness {
  pub(crate) const fn check(self) -> AutomationResult<()> {
    match self {
      Self::Live => Ok(()),
      Self::ProcessGone => Err(AutomationError::ProcessGone),
      Self::Detached => Err(AutomationError::InvalidSession),
    }
  }
}

/// Where the detector is on its way to quiescence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum QuiescenceState {
  /// Nothing is known since the last reset and nobody is waiting.
  Unknown,
  AwaitingEventLoop,
  AwaitingAnimations,
  Quiescent,
}

/// Public view of the readiness flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct QuiescenceStatus {
  pub state: QuiescenceState,
  pub generation: Generation,
  /// A reset landed while a wait was in flight and quiescence has not been
  /// reached since.
  pub stale: bool,
  pub event_loop_idle: bool,
  pub animations_idle: bool,
}

/// Readiness flags for one attach.
#[derive(Debug, Clone, Default)]
pub(crate) struct ReadinessState {
  event_loop_idle: bool,
  animations_idle: bool,
  generation: Generation,
  stale: bool,
  /// Waits currently parked on this state. Maintained by the waiters
  /// themselves, under the state lock.
  pending_waits: usize,
}

impl ReadinessState {
  pub(crate) const fn generation(&self) -> Generation {
    self.generation
  }

  pub(crate) const fn is_quiescent(&self, include_animations: bool) -> bool {
    self.event_loop_idle && (self.animations_idle || !include_animations)
  }

  /// Returns `true` if the flag was not already set.
  pub(crate) fn mark_event_loop_idle(&mut self) -> bool {
    let changed = !self.event_loop_idle;
    self.event_loop_idle = true;
    self.clear_stale_once_quiescent();
    changed
  }

  /// Returns `true` if the flag was not already set.
  pub(crate) fn mark_animations_idle(&mut self) -> bool {
    let changed = !self.animations_idle;
    self.animations_idle = true;
    self.clear_stale_once_quiescent();
    changed
  }

  /// Clear both flags and start a new generation.
  pub(crate) fn reset(&mut self) -> Generation {
    if self.pending_waits > 0 {
      self.stale = true;
    }
    self.event_loop_idle = false;
    self.animations_idle = false;
    self.generation = self.generation.next();
    self.generation
  }

  pub(crate) const fn status(&self, include_animations: bool) -> QuiescenceStatus {
    let state = if self.is_quiescent(include_animations) {
      QuiescenceState::Quiescent
    } else if self.event_loop_idle {
      QuiescenceState::AwaitingAnimations
    } else if self.pending_waits > 0 || self.animations_idle {
      QuiescenceState::AwaitingEventLoop
    } else {
      QuiescenceState::Unknown
    };
    QuiescenceStatus {
      state,
      generation: self.generation,
      stale: self.stale,
      event_loop_idle: self.event_loop_idle,
      animations_idle: self.animations_idle,
    }
  }

  /// Both signals in. A single-signal wait clears the marker itself.
  fn clear_stale_once_quiescent(&mut self) {
    if self.is_quiescent(true) {
      self.stale = false;
    }
  }
}

/// State a waiter can block on.
pub(crate) trait ReadinessView {
  fn readiness(&self) -> &ReadinessState;
  fn readiness_mut(&mut self) -> &mut ReadinessState;
  fn liveness(&self) -> Liveness;
}

/// Block until the UI is quiescent, the process goes away, or `timeout` passes.
///
/// Returns the generation in which quiescence was observed. That is the
/// generation current at entry, or a later one if readiness reset mid-wait.
pub(crate) fn wait_for_quiescence<S: ReadinessView>(
  shared: &Shared<S>,
  timeout: Duration,
  include_animations: bool,
) -> AutomationResult<Generation> {
  let started = Instant::now();
  let deadline = started.checked_add(timeout);

  let mut state = shared.lock();
  state.readiness_mut().pending_waits += 1;
  let entry_generation = state.readiness().generation();
  let mut generation = entry_generation;

  let outcome = loop {
    if let Err(e) = state.liveness().check() {
      break Err(e);
    }

    let readiness = state.readiness();
    if readiness.generation() != generation {
      log::debug!(
        "Readiness reset mid-wait (generation {generation} -> {}), waiting on new generation",
        readiness.generation()
      );
      generation = readiness.generation();
    }
    if readiness.is_quiescent(include_animations) {
      break Ok(generation);
    }

    if shared.wait_until(&mut state, deadline) {
      // One last look: a signal may have landed right at the deadline.
      let readiness = state.readiness();
      break match state.liveness().check() {
        Err(e) => Err(e),
        Ok(()) if readiness.is_quiescent(include_animations) => Ok(readiness.generation()),
        Ok(()) => Err(AutomationError::Timeout {
          waited: started.elapsed(),
        }),
      };
    }
  };

  let readiness = state.readiness_mut();
  if outcome.is_ok() {
    readiness.stale = false;
  }
  readiness.pending_waits -= 1;
  drop(state);

  match &outcome {
    Ok(g) => log::debug!(
      "Quiescent in {}ms (generation {g}, entered at {entry_generation}, animations: {include_animations})",
      started.elapsed().as_millis()
    ),
    Err(e) => log::debug!("Quiescence wait ended: {e}"),
  }
  outcome
}
