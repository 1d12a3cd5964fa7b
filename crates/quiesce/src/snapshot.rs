/*!
Accessibility snapshot cache.

Holds the most recent accessibility tree for one attach. The slot itself is
only mutated on the session worker; the capture runs on the calling thread
with no lock held.

## Single-flight refresh

At most one capture runs per attach. The first caller that finds the slot
empty or invalid becomes the *leader*: it captures, then publishes the tree
on the worker. Callers arriving while that capture is in flight become
*followers* and park until the leader publishes, then share its result
(success or error).

## Invalidation during a capture

Every invalidation bumps an epoch. A leader whose capture started under an
older epoch still hands its tree to everyone waiting on the flight and stores
it, but stores it as invalid so the next `current_snapshot` captures again.
*/

use std::sync::Arc;
use std::time::SystemTime;

use crate::quiescence::Liveness;
use crate::types::{
  AutomationError, AutomationResult, Element, Generation, ProcessId, Snapshot, SnapshotVersion,
};
use crate::worker::{Shared, WorkerHandle};

type FlightResult = AutomationResult<Arc<Snapshot>>;

/// What a caller should do after consulting the slot.
#[derive(Debug)]
pub(crate) enum Begin {
  /// A valid snapshot is cached.
  Cached(Arc<Snapshot>),
  /// Capture, then call [`SnapshotSlot::publish`].
  Lead(Flight),
  /// Wait for the in-flight capture.
  Follow(u64),
}

/// Ticket held by the leader of a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Flight {
  id: u64,
  epoch: u64,
}

/// Cache slot for one attach.
#[derive(Debug, Default)]
pub(crate) struct SnapshotSlot {
  current: Option<Arc<Snapshot>>,
  valid: bool,
  last_version: u64,
  epoch: u64,
  next_flight: u64,
  in_flight: Option<u64>,
  /// Outcome of the most recently finished flight. A success is served from
  /// `current`, so a replaced tree is not kept alive here.
  landed: Option<(u64, Result<(), AutomationError>)>,
}

impl SnapshotSlot {
  #[cfg(test)]
  pub(crate) fn current(&self) -> Option<&Arc<Snapshot>> {
    self.current.as_ref()
  }

  #[cfg(test)]
  pub(crate) const fn is_valid(&self) -> bool {
    self.valid && self.current.is_some()
  }

  /// Decide whether the caller can use the cache, should capture, or should
  /// wait. `use_cache == false` forces a capture (or joins one in flight).
  pub(crate) fn begin(&mut self, use_cache: bool) -> Begin {
    if use_cache && self.valid {
      if let Some(current) = &self.current {
        return Begin::Cached(Arc::clone(current));
      }
    }
    if let Some(id) = self.in_flight {
      return Begin::Follow(id);
    }
    self.next_flight += 1;
    let flight = Flight {
      id: self.next_flight,
      epoch: self.epoch,
    };
    self.in_flight = Some(flight.id);
    Begin::Lead(flight)
  }

  /// Land a leader's capture. Swaps the slot on success.
  pub(crate) fn publish(
    &mut self,
    flight: Flight,
    captured: AutomationResult<Element>,
    process_id: ProcessId,
    generation: Generation,
  ) -> FlightResult {
    let result = captured.map(|root| {
      self.last_version += 1;
      let snapshot = Arc::new(Snapshot {
        version: SnapshotVersion(self.last_version),
        generation,
        process_id,
        captured_at: SystemTime::now(),
        root,
      });
      self.current = Some(Arc::clone(&snapshot));
      self.valid = flight.epoch == self.epoch;
      if !self.valid {
        log::debug!(
          "Snapshot v{} invalidated while capturing, will recapture on next read",
          snapshot.version
        );
      }
      snapshot
    });

    if self.in_flight == Some(flight.id) {
      self.in_flight = None;
    }
    self.landed = Some((flight.id, result.as_ref().map(|_| ()).map_err(Clone::clone)));
    result
  }

  /// Land `flight` as failed without a tree. No-op once it has landed.
  pub(crate) fn abandon(&mut self, flight: Flight) {
    if self.in_flight != Some(flight.id) {
      return;
    }
    log::warn!("Snapshot capture {} abandoned before publishing", flight.id);
    self.in_flight = None;
    self.landed = Some((
      flight.id,
      Err(AutomationError::SnapshotFailed("capture abandoned".into())),
    ));
  }

  /// Outcome for a follower of `flight`, once that flight has landed.
  fn landed_for(&self, flight: u64) -> Option<FlightResult> {
    if self.in_flight == Some(flight) {
      return None;
    }
    match &self.landed {
      Some((id, Ok(()))) if *id >= flight => {
        Some(self.current.clone().ok_or(AutomationError::InvalidSession))
      }
      Some((id, Err(e))) if *id >= flight => Some(Err(e.clone())),
      // Slot cleared under the flight (session detached).
      _ => Some(Err(AutomationError::InvalidSession)),
    }
  }

  /// Mark the cached tree unusable. Returns `true` if it was usable before.
  pub(crate) fn invalidate(&mut self) -> bool {
    self.epoch += 1;
    std::mem::replace(&mut self.valid, false) && self.current.is_some()
  }

  /// Drop the cached tree entirely.
  pub(crate) fn clear(&mut self) {
    self.invalidate();
    self.current = None;
    self.in_flight = None;
    self.landed = None;
  }
}

/// State a follower can block on.
pub(crate) trait SnapshotView {
  fn snapshot_slot(&self) -> &SnapshotSlot;
  fn snapshot_slot_mut(&mut self) -> &mut SnapshotSlot;
  fn liveness(&self) -> Liveness;
}

/// Held by a leader between `begin` and `publish`. Dropping it armed posts
/// [`SnapshotSlot::abandon`] onto the worker.
pub(crate) struct FlightGuard<S: SnapshotView + Send + 'static> {
  handle: WorkerHandle<S>,
  flight: Flight,
  armed: bool,
}

impl<S: SnapshotView + Send + 'static> FlightGuard<S> {
  pub(crate) const fn new(handle: WorkerHandle<S>, flight: Flight) -> Self {
    Self {
      handle,
      flight,
      armed: true,
    }
  }

  /// Hand the flight over for publishing.
  pub(crate) fn disarm(mut self) -> Flight {
    self.armed = false;
    self.flight
  }
}

impl<S: SnapshotView + Send + 'static> Drop for FlightGuard<S> {
  fn drop(&mut self) {
    if !self.armed {
      return;
    }
    let flight = self.flight;
    // Worker gone means the slot went with it.
    drop(self.handle.post(move |s| s.snapshot_slot_mut().abandon(flight)));
  }
}

/// Park until `flight` lands and return the leader's outcome.
///
/// Detach wakes followers with `InvalidSession`. A process exit does not: the
/// leader always publishes, even if its capture failed.
pub(crate) fn follow_flight<S: SnapshotView>(shared: &Shared<S>, flight: u64) -> FlightResult {
  let mut state = shared.lock();
  loop {
    if state.liveness() == Liveness::Detached {
      return Err(AutomationError::InvalidSession);
    }
    if let Some(result) = state.snapshot_slot().landed_for(flight) {
      return result;
    }
    shared.wait_until(&mut state, None);
  }
}
