use crate::math::{Point2d, Rect};

/// Anything with a rectangular footprint that vehicles can collide with or sense.
pub trait Footprint {
    /// The axis-aligned bounding box of the object in world space.
    fn footprint(&self) -> Rect;
}

impl Footprint for Rect {
    fn footprint(&self) -> Rect {
        *self
    }
}

/// A static obstacle on the road, such as a barrier or a traffic cone.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Obstacle {
    /// The obstacle's bounding box.
    rect: Rect,
}

impl Obstacle {
    /// Creates an obstacle occupying the given rectangle.
    pub fn new(rect: Rect) -> Self {
        Self { rect }
    }

    /// Creates an obstacle of the given size centred on `centre`.
    pub fn centred(centre: Point2d, width: f64, height: f64) -> Self {
        Self::new(Rect::centred(centre, width, height))
    }
}

impl Footprint for Obstacle {
    fn footprint(&self) -> Rect {
        self.rect
    }
}
