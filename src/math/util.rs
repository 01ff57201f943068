use super::Vector2d;

/// A unit vector aligned with the given heading.
///
/// A heading of zero points up the screen (towards negative y),
/// and positive headings turn clockwise.
pub fn heading_vector(angle: f64) -> Vector2d {
    Vector2d::new(angle.sin(), -angle.cos())
}

/// Linearly interpolates between `a` and `b`.
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}
