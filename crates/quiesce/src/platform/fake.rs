//! Scripted in-memory platform for tests.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::Platform;
use crate::bus::ReadinessSender;
use crate::screenshot::ImageFormat;
use crate::types::{
  AutomationError, AutomationResult, Element, LifecycleState, ProcessDescriptor, ProcessId,
  ProcessInfo,
};

pub(crate) const BUNDLE: &str = "com.example.app";

pub(crate) fn init_logging() {
  drop(env_logger::builder().is_test(true).try_init());
}

pub(crate) fn process_info(pid: u32) -> ProcessInfo {
  ProcessInfo {
    process_id: ProcessId(pid),
    bundle_identifier: BUNDLE.into(),
    lifecycle: LifecycleState::Running,
    supports_animations_idle: true,
  }
}

/// Blocks `capture_tree` while held.
#[derive(Default)]
struct Gate {
  held: Mutex<bool>,
  changed: Condvar,
}

pub(crate) struct FakePlatform {
  processes: Mutex<Vec<ProcessInfo>>,
  senders: Mutex<Vec<ReadinessSender>>,
  tree: Mutex<AutomationResult<Element>>,
  screen: Mutex<AutomationResult<Vec<u8>>>,
  terminated: Mutex<Vec<ProcessId>>,
  tree_captures: AtomicUsize,
  screen_captures: AtomicUsize,
  panic_next_capture: AtomicBool,
  observe_error: Mutex<Option<AutomationError>>,
  gate: Gate,
}

impl FakePlatform {
  pub(crate) fn new() -> Self {
    Self {
      processes: Mutex::new(Vec::new()),
      senders: Mutex::new(Vec::new()),
      tree: Mutex::new(Ok(Element::of_type(2).with_identifier("root"))),
      screen: Mutex::new(Ok(vec![0x89, b'P', b'N', b'G'])),
      terminated: Mutex::new(Vec::new()),
      tree_captures: AtomicUsize::new(0),
      screen_captures: AtomicUsize::new(0),
      panic_next_capture: AtomicBool::new(false),
      observe_error: Mutex::new(None),
      gate: Gate::default(),
    }
  }

  pub(crate) fn with_process(info: ProcessInfo) -> Self {
    let platform = Self::new();
    platform.add_process(info);
    platform
  }

  pub(crate) fn add_process(&self, info: ProcessInfo) {
    self.processes.lock().push(info);
  }

  pub(crate) fn remove_process(&self, pid: ProcessId) {
    self.processes.lock().retain(|p| p.process_id != pid);
  }

  pub(crate) fn set_tree(&self, tree: AutomationResult<Element>) {
    *self.tree.lock() = tree;
  }

  pub(crate) fn set_screen(&self, screen: AutomationResult<Vec<u8>>) {
    *self.screen.lock() = screen;
  }

  /// Sender handed over by the most recent attach.
  pub(crate) fn sender(&self) -> ReadinessSender {
    self
      .senders
      .lock()
      .last()
      .cloned()
      .unwrap_or_else(|| panic!("no session attached"))
  }

  /// Fail `observe` with `error` until cleared with `None`.
  pub(crate) fn set_observe_error(&self, error: Option<AutomationError>) {
    *self.observe_error.lock() = error;
  }

  /// Make the next tree capture panic once the gate opens.
  pub(crate) fn panic_on_next_capture(&self) {
    self.panic_next_capture.store(true, Ordering::SeqCst);
  }

  pub(crate) fn tree_captures(&self) -> usize {
    self.tree_captures.load(Ordering::SeqCst)
  }

  pub(crate) fn screen_captures(&self) -> usize {
    self.screen_captures.load(Ordering::SeqCst)
  }

  pub(crate) fn terminated(&self) -> Vec<ProcessId> {
    self.terminated.lock().clone()
  }

  /// Make tree captures block until [`release_captures`](Self::release_captures).
  pub(crate) fn hold_captures(&self) {
    *self.gate.held.lock() = true;
  }

  pub(crate) fn release_captures(&self) {
    *self.gate.held.lock() = false;
    self.gate.changed.notify_all();
  }

  /// Wait until `n` tree captures have started.
  pub(crate) fn wait_for_captures(&self, n: usize, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while self.tree_captures() < n {
      if Instant::now() >= deadline {
        return false;
      }
      std::thread::sleep(Duration::from_millis(1));
    }
    true
  }
}

impl Platform for FakePlatform {
  fn find_process(&self, descriptor: &ProcessDescriptor) -> Option<ProcessInfo> {
    self
      .processes
      .lock()
      .iter()
      .rev()
      .find(|p| {
        p.bundle_identifier == descriptor.bundle_identifier
          && !matches!(descriptor.process_id, Some(pid) if pid != p.process_id)
      })
      .cloned()
  }

  fn observe(&self, _process: &ProcessInfo, signals: ReadinessSender) -> AutomationResult<()> {
    if let Some(error) = self.observe_error.lock().clone() {
      return Err(error);
    }
    self.senders.lock().push(signals);
    Ok(())
  }

  fn capture_tree(&self, _pid: ProcessId, _max_depth: usize) -> AutomationResult<Element> {
    self.tree_captures.fetch_add(1, Ordering::SeqCst);
    let mut held = self.gate.held.lock();
    while *held {
      self.gate.changed.wait(&mut held);
    }
    drop(held);
    if self.panic_next_capture.swap(false, Ordering::SeqCst) {
      panic!("accessibility service crashed");
    }
    self.tree.lock().clone()
  }

  fn capture_screen(&self, _pid: ProcessId, _format: ImageFormat) -> AutomationResult<Vec<u8>> {
    self.screen_captures.fetch_add(1, Ordering::SeqCst);
    self.screen.lock().clone()
  }

  fn terminate(&self, pid: ProcessId) -> AutomationResult<()> {
    if !self.processes.lock().iter().any(|p| p.process_id == pid) {
      return Err(AutomationError::ProcessNotFound(pid.to_string()));
    }
    self.terminated.lock().push(pid);
    Ok(())
  }
}

/// Lets tests keep a handle on the fake after handing it to a session.
impl Platform for Arc<FakePlatform> {
  fn find_process(&self, descriptor: &ProcessDescriptor) -> Option<ProcessInfo> {
    (**self).find_process(descriptor)
  }

  fn observe(&self, process: &ProcessInfo, signals: ReadinessSender) -> AutomationResult<()> {
    (**self).observe(process, signals)
  }

  fn capture_tree(&self, pid: ProcessId, max_depth: usize) -> AutomationResult<Element> {
    (**self).capture_tree(pid, max_depth)
  }

  fn capture_screen(&self, pid: ProcessId, format: ImageFormat) -> AutomationResult<Vec<u8>> {
    (**self).capture_screen(pid, format)
  }

  fn terminate(&self, pid: ProcessId) -> AutomationResult<()> {
    (**self).terminate(pid)
  }
}
