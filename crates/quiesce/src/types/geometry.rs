/*! Geometry types for element frames, in screen points. */

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Element frame in screen coordinates.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, TS)]
#[ts(export)]
pub struct Bounds {
  pub x: f64,
  pub y: f64,
  pub w: f64,
  pub h: f64,
}

impl Bounds {
  /// Frame reported for elements the runtime could not lay out.
  pub const ZERO: Self = Self {
    x: 0.0,
    y: 0.0,
    w: 0.0,
    h: 0.0,
  };

  pub const fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
    Self { x, y, w, h }
  }

  /// Check if a point is contained within these bounds (edges inclusive).
  pub fn contains(&self, point: Point) -> bool {
    point.x >= self.x
      && point.x <= self.x + self.w
      && point.y >= self.y
      && point.y <= self.y + self.h
  }

  /// Center of the frame, where a tap on this element would land.
  pub fn center(&self) -> Point {
    Point::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
  }

  /// Zero-area frames belong to offscreen or collapsed elements.
  pub fn is_empty(&self) -> bool {
    self.w <= 0.0 || self.h <= 0.0
  }

  /// Same size, origin shifted by `(dx, dy)`.
  #[must_use]
  pub fn offset(&self, dx: f64, dy: f64) -> Self {
    Self {
      x: self.x + dx,
      y: self.y + dy,
      ..*self
    }
  }
}

/// A 2D point in screen coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, TS)]
#[ts(export)]
pub struct Point {
  pub x: f64,
  pub y: f64,
}

impl Point {
  pub const fn new(x: f64, y: f64) -> Self {
    Self { x, y }
  }
}
