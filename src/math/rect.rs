use super::{LineSegment2d, Point2d};
use crate::util::Interval;

/// An axis-aligned rectangle, given by its top-left corner and its size.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// Creates a rectangle from its top-left corner and its size.
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Creates a rectangle of the given size centred on `centre`.
    pub fn centred(centre: Point2d, width: f64, height: f64) -> Self {
        Self {
            x: centre.x - 0.5 * width,
            y: centre.y - 0.5 * height,
            width,
            height,
        }
    }

    /// The centre of the rectangle.
    pub fn centre(&self) -> Point2d {
        Point2d::new(self.x + 0.5 * self.width, self.y + 0.5 * self.height)
    }

    /// The horizontal extent of the rectangle.
    pub fn horizontal(&self) -> Interval<f64> {
        Interval::new(self.x, self.x + self.width)
    }

    /// The vertical extent of the rectangle.
    pub fn vertical(&self) -> Interval<f64> {
        Interval::new(self.y, self.y + self.height)
    }

    /// The four corners, clockwise on screen starting from the top-left.
    pub fn corners(&self) -> [Point2d; 4] {
        let [left, right] = self.horizontal().as_array();
        let [top, bottom] = self.vertical().as_array();
        [
            Point2d::new(left, top),
            Point2d::new(right, top),
            Point2d::new(right, bottom),
            Point2d::new(left, bottom),
        ]
    }

    /// The four edges in the same winding order as [Rect::corners]:
    /// top, right, bottom, left.
    pub fn edges(&self) -> [LineSegment2d; 4] {
        let c = self.corners();
        [0, 1, 2, 3].map(|i| LineSegment2d::from_ends(c[i], c[(i + 1) % 4]))
    }

    /// Returns true if the interiors of the two rectangles overlap.
    /// Rectangles which merely share an edge do not overlap.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.horizontal().overlaps(&other.horizontal())
            && self.vertical().overlaps(&other.vertical())
    }

    /// Returns true if the point lies inside or on the boundary of the rectangle.
    pub fn contains(&self, point: Point2d) -> bool {
        self.horizontal().contains(point.x) && self.vertical().contains(point.y)
    }
}

/// Tests two axis-aligned bounding boxes for overlap. Touching edges are not an overlap.
pub fn aabb_overlap(a: &Rect, b: &Rect) -> bool {
    a.overlaps(b)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn overlap_is_order_independent() {
        let a = Rect::new(0.0, 0.0, 30.0, 50.0);
        let b = Rect::new(20.0, 40.0, 30.0, 50.0);
        assert!(aabb_overlap(&a, &b));
        assert!(aabb_overlap(&b, &a));

        let inner = Rect::new(5.0, 5.0, 1.0, 1.0);
        assert!(aabb_overlap(&a, &inner));
        assert!(aabb_overlap(&inner, &a));
    }

    #[test]
    fn touching_is_not_overlap() {
        let a = Rect::new(0.0, 0.0, 30.0, 50.0);
        let right = Rect::new(30.0, 0.0, 30.0, 50.0);
        let below = Rect::new(0.0, 50.0, 30.0, 50.0);
        let corner = Rect::new(30.0, 50.0, 10.0, 10.0);
        for other in [right, below, corner] {
            assert!(!aabb_overlap(&a, &other));
            assert!(!aabb_overlap(&other, &a));
        }
    }

    #[test]
    fn corners_and_edges_wind_consistently() {
        let r = Rect::centred(Point2d::new(100.0, 200.0), 20.0, 40.0);
        assert_eq!(r.x, 90.0);
        assert_eq!(r.y, 180.0);
        assert_eq!(r.centre(), Point2d::new(100.0, 200.0));

        let corners = r.corners();
        let edges = r.edges();
        for i in 0..4 {
            assert_eq!(edges[i].start, corners[i]);
            assert_eq!(edges[i].end, corners[(i + 1) % 4]);
        }
        assert_eq!(corners[0], Point2d::new(90.0, 180.0));
        assert_eq!(corners[2], Point2d::new(110.0, 220.0));
    }

    #[test]
    fn point_containment() {
        let r = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(r.contains(Point2d::new(5.0, 5.0)));
        assert!(r.contains(Point2d::new(10.0, 0.0)));
        assert!(!r.contains(Point2d::new(10.5, 5.0)));
    }
}
