/*!
Screenshot capture.

Stateless relative to the snapshot cache and deliberately not gated by
quiescence: a screenshot may show a mid-animation frame, which is exactly what
you want when diagnosing a flaky step.
*/

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::platform::Platform;
use crate::process::ApplicationProcess;
use crate::types::{AutomationError, AutomationResult};

/// Default JPEG quality for compressed screenshots.
const DEFAULT_JPEG_QUALITY: u8 = 50;

/// Encoding requested for a screenshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(tag = "format", rename_all = "lowercase")]
#[ts(export)]
pub enum ImageFormat {
  /// Lossless.
  #[default]
  Png,
  /// Lossy, `quality` in 1..=100.
  Jpeg { quality: u8 },
}

impl ImageFormat {
  /// Compressed output at the default quality.
  pub const fn compressed() -> Self {
    Self::Jpeg {
      quality: DEFAULT_JPEG_QUALITY,
    }
  }

  /// Clamp quality into the valid range.
  #[must_use]
  pub fn normalized(self) -> Self {
    match self {
      Self::Png => Self::Png,
      Self::Jpeg { quality } => Self::Jpeg {
        quality: quality.clamp(1, 100),
      },
    }
  }
}

/// Capture a screenshot of `process`.
///
/// Fails with `CaptureUnavailable` unless the process is running or suspended,
/// and with `EncodingFailed` if the platform produced no image.
pub(crate) fn capture(
  platform: &dyn Platform,
  process: &ApplicationProcess,
  format: ImageFormat,
) -> AutomationResult<Vec<u8>> {
  let lifecycle = process.current_state();
  if !lifecycle.is_capturable() {
    return Err(AutomationError::CaptureUnavailable(lifecycle));
  }

  let bytes = platform
    .capture_screen(process.process_id(), format.normalized())
    .map_err(|e| match e {
      AutomationError::EncodingFailed(_) | AutomationError::CaptureUnavailable(_) => e,
      other => AutomationError::EncodingFailed(other.to_string()),
    })?;

  if bytes.is_empty() {
    return Err(AutomationError::EncodingFailed(
      "platform returned an empty image".into(),
    ));
  }

  log::debug!(
    "Captured {format:?} screenshot of process {} ({} bytes)",
    process.process_id(),
    bytes.len()
  );
  Ok(bytes)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::platform::fake::FakePlatform;
  use crate::types::{LifecycleState, ProcessEvent, ProcessId, ProcessInfo};

  fn process(lifecycle: LifecycleState) -> ApplicationProcess {
    let mut p = ApplicationProcess::from_info(&ProcessInfo {
      process_id: ProcessId(7),
      bundle_identifier: "com.example.app".into(),
      lifecycle: LifecycleState::Launching,
      supports_animations_idle: true,
    });
    match lifecycle {
      LifecycleState::Launching => {}
      LifecycleState::Running => {
        p.observe(ProcessEvent::Activated);
      }
      LifecycleState::Suspended => {
        p.observe(ProcessEvent::Activated);
        p.observe(ProcessEvent::Backgrounded);
      }
      LifecycleState::Exited => {
        p.observe(ProcessEvent::Exited { code: 0 });
      }
      LifecycleState::Crashed => {
        p.observe(ProcessEvent::CrashReported);
      }
    }
    assert_eq!(p.current_state(), lifecycle);
    p
  }

  #[test]
  fn captures_running_and_suspended() {
    let platform = FakePlatform::new();
    for state in [LifecycleState::Running, LifecycleState::Suspended] {
      let bytes = capture(&platform, &process(state), ImageFormat::Png).unwrap();
      assert!(!bytes.is_empty());
    }
  }

  #[test]
  fn exited_process_is_unavailable() {
    let platform = FakePlatform::new();
    let result = capture(&platform, &process(LifecycleState::Exited), ImageFormat::Png);
    assert_eq!(
      result,
      Err(AutomationError::CaptureUnavailable(LifecycleState::Exited))
    );
    assert_eq!(platform.screen_captures(), 0, "platform must not be called");
  }

  #[test]
  fn launching_and_crashed_are_unavailable() {
    let platform = FakePlatform::new();
    for state in [LifecycleState::Launching, LifecycleState::Crashed] {
      let result = capture(&platform, &process(state), ImageFormat::Png);
      assert!(matches!(result, Err(AutomationError::CaptureUnavailable(_))));
    }
  }

  #[test]
  fn empty_image_is_encoding_failure() {
    let platform = FakePlatform::new();
    platform.set_screen(Ok(Vec::new()));
    let result = capture(&platform, &process(LifecycleState::Running), ImageFormat::Png);
    assert!(matches!(result, Err(AutomationError::EncodingFailed(_))));
  }

  #[test]
  fn platform_errors_become_encoding_failures() {
    let platform = FakePlatform::new();
    platform.set_screen(Err(AutomationError::Internal("gpu".into())));
    let result = capture(&platform, &process(LifecycleState::Running), ImageFormat::Png);
    assert!(matches!(result, Err(AutomationError::EncodingFailed(msg)) if msg.contains("gpu")));
  }

  #[test]
  fn jpeg_quality_is_clamped() {
    assert_eq!(
      ImageFormat::Jpeg { quality: 0 }.normalized(),
      ImageFormat::Jpeg { quality: 1 }
    );
    assert_eq!(
      ImageFormat::Jpeg { quality: 200 }.normalized(),
      ImageFormat::Jpeg { quality: 100 }
    );
    assert_eq!(ImageFormat::compressed(), ImageFormat::Jpeg { quality: 50 });
  }
}
