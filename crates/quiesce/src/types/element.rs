/*!
Accessibility element trees and the immutable snapshots that wrap them.

An [`Element`] is plain data. Once a tree is wrapped in a [`Snapshot`] and
handed out as `Arc<Snapshot>` nobody mutates it again; a refresh builds a new
tree and swaps the cache slot.
*/

use super::{Bounds, Generation, ProcessId, SnapshotVersion};
use crate::a11y::Role;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::SystemTime;
use ts_rs::TS;

/// One node of the accessibility hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Element {
  pub role: Role,
  /// Raw element type reported by the automation runtime.
  pub element_type: u32,
  pub identifier: String,
  pub label: String,
  pub title: Option<String>,
  pub value: Option<String>,
  pub placeholder: Option<String>,
  pub bounds: Bounds,
  pub enabled: bool,
  pub selected: bool,
  pub focused: bool,
  /// Runtime-specific extras (size classes, display id, ...).
  pub attributes: BTreeMap<String, String>,
  pub children: Vec<Element>,
}

impl Element {
  /// Element of the given runtime type with everything else defaulted.
  pub fn of_type(element_type: u32) -> Self {
    Self {
      role: Role::from_element_type(element_type),
      element_type,
      ..Self::default()
    }
  }

  /// Layout-only container wrapping `children`.
  pub fn container(children: Vec<Element>) -> Self {
    Self {
      children,
      ..Self::default()
    }
  }

  #[must_use]
  pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
    self.identifier = identifier.into();
    self
  }

  #[must_use]
  pub fn with_label(mut self, label: impl Into<String>) -> Self {
    self.label = label.into();
    self
  }

  #[must_use]
  pub const fn with_bounds(mut self, bounds: Bounds) -> Self {
    self.bounds = bounds;
    self
  }

  #[must_use]
  pub fn with_children(mut self, children: Vec<Element>) -> Self {
    self.children = children;
    self
  }

  /// Number of levels in this tree. A leaf has depth 1.
  pub fn depth(&self) -> usize {
    let mut max = 0;
    let mut stack = vec![(self, 1usize)];
    while let Some((node, level)) = stack.pop() {
      max = max.max(level);
      stack.extend(node.children.iter().map(|c| (c, level + 1)));
    }
    max
  }

  /// Count of all nodes below this one.
  pub fn descendant_count(&self) -> usize {
    let mut count = 0;
    let mut stack: Vec<&Element> = self.children.iter().collect();
    while let Some(node) = stack.pop() {
      count += 1;
      stack.extend(node.children.iter());
    }
    count
  }

  /// Depth-first search by accessibility identifier.
  pub fn find_by_identifier(&self, identifier: &str) -> Option<&Element> {
    let mut stack = vec![self];
    while let Some(node) = stack.pop() {
      if node.identifier == identifier {
        return Some(node);
      }
      stack.extend(node.children.iter().rev());
    }
    None
  }

  /// Drop every node deeper than `max_depth`. Returns whether anything was cut.
  pub(crate) fn truncate_depth(&mut self, max_depth: usize) -> bool {
    if max_depth <= 1 {
      let cut = !self.children.is_empty();
      self.children.clear();
      return cut;
    }
    let mut cut = false;
    for child in &mut self.children {
      cut |= child.truncate_depth(max_depth - 1);
    }
    cut
  }
}

/// Point-in-time capture of a process's accessibility tree.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct Snapshot {
  pub version: SnapshotVersion,
  /// Readiness generation current when the capture was published.
  pub generation: Generation,
  pub process_id: ProcessId,
  #[ts(skip)]
  #[serde(skip)]
  pub captured_at: SystemTime,
  pub root: Element,
}
