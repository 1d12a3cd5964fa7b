/*! Branded ID types for type-safe references. */

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use ts_rs::TS;

/// OS process identifier. May be recycled by the OS, so it never identifies a
/// session on its own; see [`SessionToken`].
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, Display, From, Into,
)]
#[ts(export)]
pub struct ProcessId(pub u32);

/// Opaque handle binding commands to one attach of one process instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, Display)]
#[ts(export)]
pub struct SessionToken(u64);

/// Global counter for `SessionToken` issuance. Starts at 1 (0 could be confused with "null").
static TOKEN_COUNTER: AtomicU64 = AtomicU64::new(1);

impl SessionToken {
  /// Issue a token no previous attach in this process has seen.
  pub(crate) fn issue() -> Self {
    Self(TOKEN_COUNTER.fetch_add(1, Ordering::Relaxed))
  }
}

/// Readiness epoch. Bumped every time the readiness flags reset.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  TS,
  Display,
  From,
  Into,
)]
#[ts(export)]
pub struct Generation(pub u64);

impl Generation {
  #[must_use]
  pub(crate) const fn next(self) -> Self {
    Self(self.0 + 1)
  }
}

/// Version of a captured accessibility snapshot. First capture is 1.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  TS,
  Display,
  From,
  Into,
)]
#[ts(export)]
pub struct SnapshotVersion(pub u64);
