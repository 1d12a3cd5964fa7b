/*!
Platform abstraction traits.

These traits define the contract between the session core and whatever talks
to the device: process discovery, the accessibility interface, the screen,
and the notification feed from the instrumented process.
Core code only uses these traits, never device-specific types directly.
*/

use crate::bus::ReadinessSender;
use crate::screenshot::ImageFormat;
use crate::types::{AutomationResult, Element, ProcessDescriptor, ProcessId, ProcessInfo};

/// Device-side operations a session depends on.
///
/// Implementations are shared across threads. Calls are never made while the
/// session state lock is held, so implementations may block.
pub trait Platform: Send + Sync + 'static {
  /// Find a running process matching the descriptor.
  fn find_process(&self, descriptor: &ProcessDescriptor) -> Option<ProcessInfo>;

  /// Start forwarding readiness and lifecycle notifications for `process`.
  ///
  /// Called once per attach. Return only once the runtime's automation
  /// channel is up and accessibility is active for the process; an error
  /// aborts the attach. The sender stops delivering when that attach ends,
  /// so implementations can keep it for as long as they like.
  fn observe(&self, process: &ProcessInfo, signals: ReadinessSender) -> AutomationResult<()>;

  /// Capture the accessibility tree of `pid`, at most `max_depth` levels deep.
  ///
  /// Failures should be reported as `AutomationError::SnapshotFailed`.
  fn capture_tree(&self, pid: ProcessId, max_depth: usize) -> AutomationResult<Element>;

  /// Capture and encode the screen showing `pid`.
  ///
  /// Failures should be reported as `AutomationError::EncodingFailed`.
  fn capture_screen(&self, pid: ProcessId, format: ImageFormat) -> AutomationResult<Vec<u8>>;

  /// Ask the OS to terminate `pid`.
  fn terminate(&self, pid: ProcessId) -> AutomationResult<()>;
}
