/*! Core types for quiesce.

Regenerate TypeScript types: `cargo test export_bindings`
*/

#![allow(missing_docs)]

mod element;
mod error;
mod event;
mod geometry;
mod ids;
mod process;

pub use element::{Element, Snapshot};
pub use error::{AutomationError, AutomationResult};
pub use event::{ResetReason, SessionEvent};
pub use geometry::{Bounds, Point};
pub use ids::{Generation, ProcessId, SessionToken, SnapshotVersion};
pub use process::{LifecycleState, ProcessDescriptor, ProcessEvent, ProcessInfo};
