//! Geometric primitives and the pure functions built on them.

use cgmath::{Point2, Vector2};
pub use rect::{aabb_overlap, Rect};
pub use segment::{segment_intersection, Intersection, LineSegment2d};
pub use util::*;

mod rect;
mod segment;
mod util;

/// A 2D point
pub type Point2d = Point2<f64>;

/// A 2D vector
pub type Vector2d = Vector2<f64>;
