use crate::error::{ConfigError, Result};
use crate::math::{LineSegment2d, Point2d};
use crate::util::Interval;

/// The attributes of a road.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoadAttributes {
    /// The x-coordinate of the centre of the road.
    pub centre_x: f64,
    /// The total width of the road.
    pub width: f64,
    /// The number of lanes.
    pub lane_count: usize,
}

impl Default for RoadAttributes {
    fn default() -> Self {
        Self {
            centre_x: 200.0,
            width: 300.0,
            lane_count: 3,
        }
    }
}

/// A straight road running vertically, divided into lanes of equal width.
#[derive(Clone, Debug)]
pub struct Road {
    /// The x-coordinate of the centre line.
    centre_x: f64,
    /// The horizontal extent of the road.
    bounds: Interval<f64>,
    /// The number of lanes.
    lane_count: usize,
    /// The width of each lane.
    lane_width: f64,
    /// The vertical offset of the viewport, for rendering only.
    scroll_offset: f64,
}

impl Road {
    /// Creates a new road.
    pub fn new(attributes: &RoadAttributes) -> Result<Self> {
        let RoadAttributes {
            centre_x,
            width,
            lane_count,
        } = *attributes;
        if !(width.is_finite() && width > 0.0) {
            return Err(ConfigError::RoadWidth(width));
        }
        if lane_count < 1 {
            return Err(ConfigError::LaneCount(lane_count));
        }
        Ok(Self {
            centre_x,
            bounds: Interval::new(centre_x - 0.5 * width, centre_x + 0.5 * width),
            lane_count,
            lane_width: width / lane_count as f64,
            scroll_offset: 0.0,
        })
    }

    /// The x-coordinate of the centre line.
    pub fn centre_x(&self) -> f64 {
        self.centre_x
    }

    /// The total width of the road.
    pub fn width(&self) -> f64 {
        self.bounds.length()
    }

    /// The number of lanes.
    pub fn lane_count(&self) -> usize {
        self.lane_count
    }

    /// The width of a single lane.
    pub fn lane_width(&self) -> f64 {
        self.lane_width
    }

    /// The x-coordinate of the left edge of the road.
    pub fn left_boundary(&self) -> f64 {
        self.bounds.min
    }

    /// The x-coordinate of the right edge of the road.
    pub fn right_boundary(&self) -> f64 {
        self.bounds.max
    }

    /// The horizontal extent of the road.
    pub fn bounds(&self) -> Interval<f64> {
        self.bounds
    }

    /// The x-coordinate of the centre of lane `lane`.
    /// Out of range indices are clamped to the nearest lane.
    pub fn lane_center(&self, lane: isize) -> f64 {
        let lane = lane.clamp(0, self.lane_count as isize - 1);
        self.bounds.min + self.lane_width * (lane as f64 + 0.5)
    }

    /// The x-coordinates of the centres of all lanes, left to right.
    pub fn lane_centers(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.lane_count).map(|lane| self.lane_center(lane as isize))
    }

    /// The index of the lane containing `x`, clamped to the road.
    pub fn lane_index(&self, x: f64) -> usize {
        let lane = ((x - self.bounds.min) / self.lane_width).floor();
        lane.clamp(0.0, (self.lane_count - 1) as f64) as usize
    }

    /// Whether a footprint centred on `x` with the given half width lies on the road.
    pub fn within_bounds(&self, x: f64, half_width: f64) -> bool {
        x - half_width >= self.bounds.min && x + half_width <= self.bounds.max
    }

    /// The two road edges as line segments spanning `extent` either side of `y`.
    pub fn borders(&self, y: f64, extent: f64) -> [LineSegment2d; 2] {
        self.bounds.as_array().map(|x| {
            LineSegment2d::from_ends(Point2d::new(x, y - extent), Point2d::new(x, y + extent))
        })
    }

    /// The vertical offset of the viewport. This is used purely for rendering continuity.
    pub fn scroll_offset(&self) -> f64 {
        self.scroll_offset
    }

    /// Sets the vertical offset of the viewport.
    pub fn set_scroll_offset(&mut self, offset: f64) {
        self.scroll_offset = offset;
    }
}
