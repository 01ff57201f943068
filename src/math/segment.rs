use super::{Point2d, Vector2d};
use cgmath::prelude::*;

/// Denominators smaller than this are treated as parallel segments.
const PARALLEL_EPSILON: f64 = 1e-9;

/// A straight line segment between two points.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LineSegment2d {
    pub start: Point2d,
    pub end: Point2d,
}

/// The point at which two line segments cross.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Intersection {
    /// The intersection point in world space.
    pub point: Point2d,
    /// The parameter along the first segment, in `[0, 1]`.
    pub t: f64,
    /// The parameter along the second segment, in `[0, 1]`.
    pub u: f64,
}

impl LineSegment2d {
    /// Creates a line segment from its two end points.
    pub const fn from_ends(start: Point2d, end: Point2d) -> Self {
        Self { start, end }
    }

    /// The vector from the start of the segment to its end.
    pub fn delta(&self) -> Vector2d {
        self.end - self.start
    }

    /// The length of the segment.
    pub fn length(&self) -> f64 {
        self.delta().magnitude()
    }

    /// Samples the point at parameter `t` along the segment.
    pub fn lerp(&self, t: f64) -> Point2d {
        self.start + t * self.delta()
    }

    /// Intersects this segment with another.
    ///
    /// Returns `None` if the segments are parallel or collinear, or if they don't cross.
    /// Intersections at the end points of either segment are included.
    pub fn intersect(&self, other: &LineSegment2d) -> Option<Intersection> {
        let r = self.delta();
        let s = other.delta();
        let denom = cross(r, s);
        if denom.abs() < PARALLEL_EPSILON {
            return None;
        }

        let ac = other.start - self.start;
        let t = cross(ac, s) / denom;
        let u = cross(ac, r) / denom;
        if !(0.0..=1.0).contains(&t) || !(0.0..=1.0).contains(&u) {
            return None;
        }

        Some(Intersection {
            point: self.lerp(t),
            t,
            u,
        })
    }
}

/// Finds the point where segment `ab` crosses segment `cd`, if any.
pub fn segment_intersection(a: Point2d, b: Point2d, c: Point2d, d: Point2d) -> Option<Point2d> {
    LineSegment2d::from_ends(a, b)
        .intersect(&LineSegment2d::from_ends(c, d))
        .map(|i| i.point)
}

/// The z-component of the cross product of two 2D vectors.
fn cross(a: Vector2d, b: Vector2d) -> f64 {
    a.x * b.y - a.y * b.x
}
