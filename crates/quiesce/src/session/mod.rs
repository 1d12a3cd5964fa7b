/*!
Automation session - the façade the command-dispatch layer drives.

# Module Structure

- `mod.rs` - `AutomationSession`, builder, attach/detach, token-scoped operations
- `state.rs` - per-attach state owned by the worker, notification handlers

# Attach lifetime

Every attach gets a fresh [`SessionToken`], its own worker thread and its own
state. Commands carry the token; a token from a detached or superseded attach
is rejected with `InvalidSession` even if the OS has recycled the process id.

A process that exits or crashes keeps its attach until the caller detaches or
attaches again. Until then token-scoped operations report what went wrong
(`ProcessGone`, `CaptureUnavailable`) while [`AutomationSession::validate`]
already refuses the token.

# Example

```ignore
use quiesce::{AutomationSession, ProcessDescriptor};
use std::time::Duration;

let session = AutomationSession::builder()
    .default_timeout(Duration::from_secs(5))
    .build(platform);

let token = session.attach(&ProcessDescriptor::bundle("com.example.app"))?;
session.wait_for_quiescence(token, Duration::from_secs(2), true)?;
let snapshot = session.current_snapshot(token)?;

session.detach();
```
*/

mod state;

pub(crate) use state::SessionState;

use async_broadcast::{InactiveReceiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use crate::bus::ReadinessSender;
use crate::platform::Platform;
use crate::process::ApplicationProcess;
use crate::quiescence::{self, QuiescenceState, QuiescenceStatus, ReadinessView};
use crate::screenshot::{self, ImageFormat};
use crate::snapshot::{self as snapshot_cache, Begin, FlightGuard};
use crate::types::{
  AutomationError, AutomationResult, Element, Generation, LifecycleState, ProcessDescriptor,
  ProcessId, ProcessInfo, ResetReason, SessionEvent, SessionToken, Snapshot,
};
use crate::worker::{Shared, Worker, WorkerHandle};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_SNAPSHOT_MAX_DEPTH: usize = 60;
const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Session-wide settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
  /// Budget for [`AutomationSession::wait_for_quiescence_default`].
  pub default_timeout: Duration,
  /// Wait for animations as well as the event loop by default.
  pub include_animations: bool,
  /// Accessibility trees are cut below this depth.
  pub snapshot_max_depth: usize,
  /// Buffered events per subscriber before the oldest are dropped.
  pub event_capacity: usize,
}

impl Default for SessionConfig {
  fn default() -> Self {
    Self {
      default_timeout: DEFAULT_TIMEOUT,
      include_animations: true,
      snapshot_max_depth: DEFAULT_SNAPSHOT_MAX_DEPTH,
      event_capacity: DEFAULT_EVENT_CAPACITY,
    }
  }
}

impl SessionConfig {
  /// Whether default waits for `process` need the animations-idle signal.
  ///
  /// Runtimes that never deliver it fall back to single-signal mode.
  pub const fn include_animations_for(&self, process: &ProcessInfo) -> bool {
    self.include_animations && process.supports_animations_idle
  }
}

/// Builder for configuring an [`AutomationSession`].
#[derive(Debug, Default, Clone, Copy)]
#[must_use = "Builder does nothing until .build() is called"]
pub struct SessionBuilder {
  config: SessionConfig,
}

impl SessionBuilder {
  /// Budget used by `wait_for_quiescence_default`. Default: 10s.
  pub const fn default_timeout(mut self, timeout: Duration) -> Self {
    self.config.default_timeout = timeout;
    self
  }

  /// Wait for animations by default where the runtime reports them. Default: true.
  pub const fn include_animations(mut self, include: bool) -> Self {
    self.config.include_animations = include;
    self
  }

  /// Maximum accessibility tree depth kept in snapshots. Default: 60.
  pub const fn snapshot_max_depth(mut self, depth: usize) -> Self {
    self.config.snapshot_max_depth = depth;
    self
  }

  /// Event buffer per subscriber. Default: 1024.
  pub const fn event_capacity(mut self, capacity: usize) -> Self {
    self.config.event_capacity = capacity;
    self
  }

  /// Build the session around a device platform.
  pub fn build(self, platform: impl Platform) -> AutomationSession {
    AutomationSession::create(self.config, Arc::new(platform))
  }
}

/// One live attach.
struct Attachment {
  token: SessionToken,
  shared: Arc<Shared<SessionState>>,
  worker: Worker<SessionState>,
}

/// What an operation needs from the attach its token names.
struct Bound {
  shared: Arc<Shared<SessionState>>,
  handle: WorkerHandle<SessionState>,
}

/// Drives at most one attached application process at a time.
///
/// Clone is cheap (Arc bumps) - share freely across threads. Any number of
/// threads may call operations concurrently.
pub struct AutomationSession {
  platform: Arc<dyn Platform>,
  config: SessionConfig,
  attachment: Arc<Mutex<Option<Attachment>>>,
  events_tx: Sender<SessionEvent>,
  events_keepalive: InactiveReceiver<SessionEvent>,
}

impl Clone for AutomationSession {
  fn clone(&self) -> Self {
    Self {
      platform: Arc::clone(&self.platform),
      config: self.config,
      attachment: Arc::clone(&self.attachment),
      events_tx: self.events_tx.clone(),
      events_keepalive: self.events_keepalive.clone(),
    }
  }
}

impl std::fmt::Debug for AutomationSession {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AutomationSession")
      .field("config", &self.config)
      .finish_non_exhaustive()
  }
}

impl AutomationSession {
  /// Create a session with default settings.
  pub fn new(platform: impl Platform) -> Self {
    Self::builder().build(platform)
  }

  /// Start from the default [`SessionConfig`].
  pub fn builder() -> SessionBuilder {
    SessionBuilder::default()
  }

  fn create(config: SessionConfig, platform: Arc<dyn Platform>) -> Self {
    let (mut tx, rx) = async_broadcast::broadcast(config.event_capacity.max(1));
    tx.set_overflow(true);

    Self {
      platform,
      config,
      attachment: Arc::new(Mutex::new(None)),
      events_tx: tx,
      events_keepalive: rx.deactivate(),
    }
  }

  /// Settings this session was built with.
  pub const fn config(&self) -> &SessionConfig {
    &self.config
  }

  /// Subscribe to session events.
  pub fn subscribe(&self) -> async_broadcast::Receiver<SessionEvent> {
    self.events_keepalive.activate_cloned()
  }

  // ========== Attach lifetime ==========

  /// Bind to a running process and issue a fresh token.
  ///
  /// An attach whose process has exited or crashed is superseded; a live one
  /// is `AlreadyAttached`.
  pub fn attach(&self, descriptor: &ProcessDescriptor) -> AutomationResult<SessionToken> {
    let mut current = self.attachment.lock();

    if let Some(existing) = current.as_ref() {
      let process = existing.shared.read(|s| s.process().clone());
      if process.current_state().is_live() {
        return Err(AutomationError::AlreadyAttached(process.process_id()));
      }
    }
    if let Some(stale) = current.take() {
      log::info!("Superseding session {} (process gone)", stale.token);
      teardown(stale);
    }

    let info = self
      .platform
      .find_process(descriptor)
      .filter(|info| {
        info.lifecycle.is_live() && !matches!(descriptor.process_id, Some(pid) if pid != info.process_id)
      })
      .ok_or_else(|| AutomationError::ProcessNotFound(descriptor.bundle_identifier.clone()))?;

    let token = SessionToken::issue();
    let shared = Arc::new(Shared::new(SessionState::new(
      token,
      &info,
      self.events_tx.clone(),
    )));
    let worker = Worker::spawn(format!("quiesce-session-{token}"), Arc::clone(&shared))?;
    self
      .platform
      .observe(&info, ReadinessSender::new(worker.handle(), token))?;

    *current = Some(Attachment {
      token,
      shared,
      worker,
    });
    drop(current);

    log::info!(
      "Attached session {token} to {} (pid {}, {} mode)",
      info.bundle_identifier,
      info.process_id,
      if self.config.include_animations_for(&info) {
        "dual-signal"
      } else {
        "single-signal"
      }
    );
    state::emit(
      &self.events_tx,
      SessionEvent::Attached {
        token,
        process_id: info.process_id,
      },
    );
    Ok(token)
  }

  /// Tear down the current attach. Leaves the process running. Idempotent.
  pub fn detach(&self) {
    let Some(attachment) = self.attachment.lock().take() else {
      return;
    };
    log::info!("Detached session {}", attachment.token);
    teardown(attachment);
  }

  /// Check that `token` names the current attach and its process is alive.
  pub fn validate(&self, token: SessionToken) -> AutomationResult<()> {
    let bound = self.bind(token)?;
    bound.shared.read(|s| {
      if s.process().current_state().is_live() {
        Ok(())
      } else {
        Err(AutomationError::InvalidSession)
      }
    })
  }

  /// Sender for the platform's notifications. Normally handed over by
  /// [`Platform::observe`]; exposed for drivers that wire signals themselves.
  pub fn readiness_sender(&self, token: SessionToken) -> AutomationResult<ReadinessSender> {
    let bound = self.bind(token)?;
    Ok(ReadinessSender::new(bound.handle, token))
  }

  // ========== Process ==========

  /// Lifecycle state of the attached process.
  pub fn current_state(&self, token: SessionToken) -> AutomationResult<LifecycleState> {
    Ok(self.bind(token)?.shared.read(|s| s.process().current_state()))
  }

  /// Copy of the attached process record.
  pub fn process(&self, token: SessionToken) -> AutomationResult<ApplicationProcess> {
    Ok(self.bind(token)?.shared.read(|s| s.process().clone()))
  }

  /// Ask the OS to end the process. No-op once it has exited or crashed.
  pub fn terminate(&self, token: SessionToken) -> AutomationResult<()> {
    let bound = self.bind(token)?;
    let process = bound.shared.read(|s| s.process().clone());
    if process.current_state().is_terminal() {
      return Ok(());
    }
    self.platform.terminate(process.process_id())?;
    bound.handle.run(move |s| -> AutomationResult<()> {
      s.bound(token)?;
      s.on_terminated();
      Ok(())
    })?
  }

  // ========== Readiness ==========

  /// Readiness flags, evaluated for the session's default mode.
  pub fn readiness(&self, token: SessionToken) -> AutomationResult<QuiescenceStatus> {
    let include = self.config.include_animations;
    Ok(
      self
        .bind(token)?
        .shared
        .read(|s| s.readiness().status(s.effective_animations(include))),
    )
  }

  /// Summary of readiness in the configured animations mode.
  pub fn quiescence_state(&self, token: SessionToken) -> AutomationResult<QuiescenceState> {
    self.readiness(token).map(|status| status.state)
  }

  /// Block until the UI is quiescent.
  ///
  /// `include_animations` is ignored on runtimes that never report
  /// animations idle. Returns the generation quiescence was observed in.
  pub fn wait_for_quiescence(
    &self,
    token: SessionToken,
    timeout: Duration,
    include_animations: bool,
  ) -> AutomationResult<Generation> {
    let bound = self.bind(token)?;
    let include = bound.shared.read(|s| s.effective_animations(include_animations));
    if include != include_animations {
      log::debug!("Runtime does not report animations idle, waiting on event loop only");
    }
    quiescence::wait_for_quiescence(&bound.shared, timeout, include)
  }

  /// [`wait_for_quiescence`](Self::wait_for_quiescence) with the configured defaults.
  pub fn wait_for_quiescence_default(&self, token: SessionToken) -> AutomationResult<Generation> {
    self.wait_for_quiescence(
      token,
      self.config.default_timeout,
      self.config.include_animations,
    )
  }

  /// Start a new readiness generation before a UI-mutating command.
  /// Also invalidates the cached snapshot.
  pub fn reset_readiness(&self, token: SessionToken) -> AutomationResult<Generation> {
    self.bind(token)?.handle.run(move |s| -> AutomationResult<Generation> {
      s.bound(token)?;
      s.liveness().check()?;
      Ok(s.reset_readiness(ResetReason::Command))
    })?
  }

  // ========== Snapshots ==========

  /// Cached tree if still valid, otherwise a fresh capture.
  pub fn current_snapshot(&self, token: SessionToken) -> AutomationResult<Arc<Snapshot>> {
    self.snapshot(token, true)
  }

  /// Capture a fresh tree, joining a capture already in flight.
  pub fn refresh_snapshot(&self, token: SessionToken) -> AutomationResult<Arc<Snapshot>> {
    self.snapshot(token, false)
  }

  /// Returns `true` if a usable tree was dropped.
  pub fn invalidate_snapshot(&self, token: SessionToken) -> AutomationResult<bool> {
    self.bind(token)?.handle.run(move |s| -> AutomationResult<bool> {
      s.bound(token)?;
      Ok(s.invalidate_snapshot())
    })?
  }

  /// Screenshot of the attached process. Not gated by quiescence.
  pub fn capture_screenshot(
    &self,
    token: SessionToken,
    format: ImageFormat,
  ) -> AutomationResult<Vec<u8>> {
    let process = self.process(token)?;
    screenshot::capture(self.platform.as_ref(), &process, format)
  }

  fn snapshot(&self, token: SessionToken, use_cache: bool) -> AutomationResult<Arc<Snapshot>> {
    let bound = self.bind(token)?;
    let (begin, pid) = bound.handle.run(move |s| -> AutomationResult<(Begin, ProcessId)> {
      s.bound(token)?;
      s.liveness().check()?;
      Ok((
        s.snapshot_slot_mut().begin(use_cache),
        s.process().process_id(),
      ))
    })??;

    match begin {
      Begin::Cached(snapshot) => Ok(snapshot),
      Begin::Follow(flight) => {
        log::debug!("Joining in-flight snapshot capture");
        snapshot_cache::follow_flight(&bound.shared, flight)
      }
      Begin::Lead(flight) => {
        let guard = FlightGuard::new(bound.handle.clone(), flight);
        let captured = self.capture_tree(pid);
        let flight = guard.disarm();
        bound
          .handle
          .run(move |s| s.publish_snapshot(flight, captured))?
      }
    }
  }

  fn capture_tree(&self, pid: ProcessId) -> AutomationResult<Element> {
    let max_depth = self.config.snapshot_max_depth;
    let mut root = self
      .platform
      .capture_tree(pid, max_depth)
      .map_err(|e| match e {
        AutomationError::SnapshotFailed(_)
        | AutomationError::ProcessGone
        | AutomationError::InvalidSession => e,
        other => AutomationError::SnapshotFailed(other.to_string()),
      })?;
    if root.truncate_depth(max_depth) {
      log::warn!("Accessibility tree of process {pid} deeper than {max_depth} levels, truncated");
    }
    Ok(root)
  }

  /// Resolve `token` to the current attach.
  fn bind(&self, token: SessionToken) -> AutomationResult<Bound> {
    let bound = {
      let current = self.attachment.lock();
      let attachment = current
        .as_ref()
        .filter(|a| a.token == token)
        .ok_or(AutomationError::InvalidSession)?;
      Bound {
        shared: Arc::clone(&attachment.shared),
        handle: attachment.worker.handle(),
      }
    };
    bound.shared.read(|s| s.bound(token))?;
    Ok(bound)
  }
}

/// Detach on the worker, then stop it. Wakes every parked waiter.
fn teardown(attachment: Attachment) {
  let Attachment { token, worker, .. } = attachment;
  if let Err(e) = worker.handle().run(SessionState::detach) {
    log::warn!("Session {token} worker was already gone: {e}");
  }
  drop(worker);
}
