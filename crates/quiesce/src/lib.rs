/*!
Quiesce - quiescence-gated UI automation sessions

Drives one instrumented application process at a time: tracks its lifecycle,
knows when its UI has settled, caches its accessibility tree and grabs
screenshots. Device access goes through a [`Platform`] supplied by the
embedding driver.

```ignore
use quiesce::{AutomationSession, ImageFormat, ProcessDescriptor};
use std::time::Duration;

let session = AutomationSession::new(platform);
let token = session.attach(&ProcessDescriptor::bundle("com.example.app"))?;

// Before every interaction: wait for the UI to settle
session.wait_for_quiescence(token, Duration::from_secs(5), true)?;

// Before a UI-mutating command: start a new readiness generation
session.reset_readiness(token)?;

// Serve "get tree" and "get screenshot"
let tree = session.current_snapshot(token)?;
let png = session.capture_screenshot(token, ImageFormat::Png)?;

// Subscribe to events
let mut events = session.subscribe();
while let Ok(event) = events.recv().await {
    // handle event
}

session.detach();
```
*/

mod bus;
mod platform;
mod process;
mod quiescence;
mod screenshot;
mod session;
mod snapshot;
mod worker;

pub mod a11y;

mod types;
pub use types::*;

pub use crate::bus::ReadinessSender;
pub use crate::platform::Platform;
pub use crate::process::ApplicationProcess;
pub use crate::quiescence::{QuiescenceState, QuiescenceStatus};
pub use crate::screenshot::ImageFormat;
pub use crate::session::{AutomationSession, SessionBuilder, SessionConfig};
