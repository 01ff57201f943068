use crate::debug::debug_line;
use crate::error::{ConfigError, Result};
use crate::math::{heading_vector, lerp, LineSegment2d, Point2d, Rect};
use crate::road::Road;
use crate::vehicle::Neighbour;
use crate::{VehicleId, VehicleSet};
use smallvec::SmallVec;
use std::f64::consts::FRAC_PI_2;

/// How far the road borders extend either side of the sensing vehicle.
const BORDER_EXTENT: f64 = 1.0e5;

/// The attributes of a sensor array.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SensorAttributes {
    /// The number of rays.
    pub ray_count: usize,
    /// The length of each ray.
    pub ray_length: f64,
    /// The angle covered by the fan of rays, in radians.
    pub ray_spread: f64,
    /// The weight given to each new reading by the smoothing filter, in `(0, 1]`.
    pub smoothing: f64,
    /// The minimum simulated time between updates in seconds, or zero to update every tick.
    pub update_interval: f64,
}

impl Default for SensorAttributes {
    fn default() -> Self {
        Self {
            ray_count: 5,
            ray_length: 150.0,
            ray_spread: FRAC_PI_2,
            smoothing: 0.2,
            update_interval: 0.0,
        }
    }
}

impl SensorAttributes {
    /// Checks that the attributes describe a valid sensor.
    pub fn validate(&self) -> Result<()> {
        if self.ray_count < 1 {
            return Err(ConfigError::RayCount(self.ray_count));
        }
        if !(self.ray_length.is_finite() && self.ray_length > 0.0) {
            return Err(ConfigError::RayLength(self.ray_length));
        }
        if !(self.smoothing > 0.0 && self.smoothing <= 1.0) {
            return Err(ConfigError::SmoothingFactor(self.smoothing));
        }
        Ok(())
    }
}

/// A fan of rays attached to a vehicle, measuring the distance
/// to the nearest road edge, vehicle or obstacle along each ray.
///
/// Readings are normalised to `[0, 1]`, where 1 means nothing was detected.
#[derive(Clone, Debug)]
pub struct SensorArray {
    /// The vehicle the sensor is fitted to.
    owner: VehicleId,
    /// The sensor's configuration.
    attributes: SensorAttributes,
    /// Simulated time since the last update, in s.
    since_update: f64,
    /// The rays cast in the last update.
    rays: Vec<LineSegment2d>,
    /// The nearest hit along each ray, if any.
    hits: Vec<Option<Point2d>>,
    /// The unfiltered readings from the last update.
    raw: Vec<f64>,
    /// The exponentially smoothed readings.
    smoothed: Vec<f64>,
}

impl SensorArray {
    /// Creates a new sensor array fitted to the given vehicle.
    pub fn new(owner: VehicleId, attributes: &SensorAttributes) -> Result<Self> {
        attributes.validate()?;
        let n = attributes.ray_count;
        Ok(Self {
            owner,
            attributes: *attributes,
            since_update: attributes.update_interval,
            rays: Vec::with_capacity(n),
            hits: vec![None; n],
            raw: vec![1.0; n],
            smoothed: vec![1.0; n],
        })
    }

    /// The ID of the vehicle the sensor is fitted to.
    pub fn owner(&self) -> VehicleId {
        self.owner
    }

    /// The number of rays.
    pub fn ray_count(&self) -> usize {
        self.attributes.ray_count
    }

    /// The length of each ray.
    pub fn ray_length(&self) -> f64 {
        self.attributes.ray_length
    }

    /// The rays cast in the last update, leftmost first.
    pub fn rays(&self) -> &[LineSegment2d] {
        &self.rays
    }

    /// The nearest detected point along each ray.
    pub fn hits(&self) -> &[Option<Point2d>] {
        &self.hits
    }

    /// The unfiltered readings from the last update.
    pub fn readings(&self) -> &[f64] {
        &self.raw
    }

    /// The smoothed readings.
    pub fn smoothed(&self) -> &[f64] {
        &self.smoothed
    }

    /// Clears all readings back to "nothing detected".
    pub fn reset(&mut self) {
        self.rays.clear();
        self.hits.fill(None);
        self.raw.fill(1.0);
        self.smoothed.fill(1.0);
        self.since_update = self.attributes.update_interval;
    }

    /// Recomputes the rays from a vehicle pose.
    ///
    /// The rays fan out symmetrically about the heading, from left to right.
    /// A single ray points straight ahead.
    pub fn cast_rays(&mut self, origin: Point2d, angle: f64) {
        let SensorAttributes {
            ray_count,
            ray_length,
            ray_spread,
            ..
        } = self.attributes;
        self.rays.clear();
        self.rays.extend((0..ray_count).map(|i| {
            let t = if ray_count == 1 {
                0.5
            } else {
                i as f64 / (ray_count - 1) as f64
            };
            let ray_angle = angle + lerp(-0.5 * ray_spread, 0.5 * ray_spread, t);
            LineSegment2d::from_ends(origin, origin + ray_length * heading_vector(ray_angle))
        }));
    }

    /// Updates the sensor from the current state of the simulation.
    ///
    /// The owner is looked up in `vehicles`; every other vehicle in `neighbours`
    /// and every obstacle is a target. Returns `false` if the update was skipped,
    /// either because it is throttled or because the owner no longer exists.
    pub(crate) fn update(
        &mut self,
        vehicles: &VehicleSet,
        neighbours: &[Neighbour],
        obstacles: &[Rect],
        road: &Road,
        dt: f64,
    ) -> bool {
        self.since_update += dt;
        if self.since_update < self.attributes.update_interval {
            return false;
        }
        let Some(owner) = vehicles.get(self.owner) else {
            return false;
        };
        self.since_update = 0.0;

        let targets = neighbours
            .iter()
            .filter(|n| n.id != self.owner)
            .map(|n| n.footprint)
            .chain(obstacles.iter().copied())
            .collect::<SmallVec<[Rect; 32]>>();
        self.sense(owner.position(), owner.angle(), road, &targets);
        true
    }

    /// Casts rays from the given pose and measures them against the road edges
    /// and the given targets, then feeds the readings through the smoothing filter.
    pub fn sense(&mut self, origin: Point2d, angle: f64, road: &Road, targets: &[Rect]) {
        self.cast_rays(origin, angle);

        let borders = road.borders(origin.y, BORDER_EXTENT);
        let edges = targets
            .iter()
            .flat_map(|rect| rect.edges())
            .chain(borders)
            .collect::<SmallVec<[LineSegment2d; 64]>>();

        let alpha = self.attributes.smoothing;
        for (i, ray) in self.rays.iter().enumerate() {
            let nearest = edges
                .iter()
                .filter_map(|edge| ray.intersect(edge))
                .min_by(|a, b| a.t.total_cmp(&b.t));

            // The ray has the sensor's full length, so `t` is the normalised distance
            let reading = nearest.map_or(1.0, |hit| hit.t.min(1.0));
            self.hits[i] = nearest.map(|hit| hit.point);
            self.raw[i] = reading;
            self.smoothed[i] = self.smoothed[i] * (1.0 - alpha) + reading * alpha;

            debug_line("sensor ray", ray.start, nearest.map_or(ray.end, |hit| hit.point));
        }
    }
}
