//! Autonomous background traffic.
//!
//! Traffic vehicles live in the simulation's vehicle arena like any other
//! vehicle. The [`TrafficController`] only tracks which of them are on the
//! road and which are parked in its pool waiting to be reused.

use crate::error::{ConfigError, Result};
use crate::math::{Point2d, Rect};
use crate::road::Road;
use crate::util::Interval;
use crate::vehicle::{
    DecisionRules, Neighbour, Spawn, Vehicle, VehicleAttributes, VehicleClass,
};
use crate::{VehicleId, VehicleSet};
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Uniform, WeightedIndex};
use smallvec::SmallVec;

/// The size and speed range of one class of traffic vehicle.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClassProfile {
    /// The vehicle class.
    pub class: VehicleClass,
    /// The relative likelihood of spawning this class.
    pub weight: f64,
    /// The range of widths.
    pub width: Interval<f64>,
    /// The range of lengths.
    pub height: Interval<f64>,
    /// The range of cruise speeds.
    pub speed: Interval<f64>,
}

impl ClassProfile {
    /// Creates a profile with a fixed footprint.
    pub const fn new(class: VehicleClass, width: f64, height: f64, speed: Interval<f64>) -> Self {
        Self {
            class,
            weight: 1.0,
            width: Interval::new(width, width),
            height: Interval::new(height, height),
            speed,
        }
    }

    fn validate(&self, max_speed: f64) -> Result<()> {
        let ranges = [
            ("class width", self.width),
            ("class height", self.height),
            ("class speed", self.speed),
        ];
        for (name, range) in ranges {
            if !(range.min.is_finite() && range.max.is_finite() && range.is_ordered()) {
                return Err(ConfigError::Traffic {
                    name,
                    reason: format!("{:?} is not a valid range", range),
                });
            }
        }
        if self.width.min <= 0.0 || self.height.min <= 0.0 {
            return Err(ConfigError::Footprint {
                width: self.width.min,
                height: self.height.min,
            });
        }
        if self.speed.min < 0.0 || self.speed.max > max_speed {
            return Err(ConfigError::Traffic {
                name: "class speed",
                reason: format!("{:?} is outside [0, {}]", self.speed, max_speed),
            });
        }
        Ok(())
    }
}

/// The attributes of the traffic controller.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrafficAttributes {
    /// The physical model shared by every traffic vehicle.
    /// The footprint and cruise speed are overridden per class.
    pub vehicle: VehicleAttributes,
    /// The classes of vehicle that may be spawned.
    pub classes: Vec<ClassProfile>,
    /// The car-following rules.
    pub rules: DecisionRules,
    /// Simulated time between regular spawns, in s.
    pub spawn_interval: f64,
    /// The number of vehicles spawned when traffic starts.
    pub initial_count: usize,
    /// The maximum number of traffic vehicles on the road at once.
    pub max_population: usize,
    /// The chance per tick of spawning an extra vehicle.
    pub density_probability: f64,
    /// How far ahead of the reference vehicle new traffic appears.
    pub spawn_distance: Interval<f64>,
    /// How far behind the reference vehicle traffic is recycled.
    pub recycle_distance: f64,
    /// The lateral distance within which an obstacle is in the vehicle's path.
    pub obstacle_lateral: f64,
    /// The longitudinal distance within which a vehicle slows for an obstacle.
    pub obstacle_slow_distance: f64,
    /// The longitudinal distance within which a vehicle stops for an obstacle.
    pub obstacle_stop_distance: f64,
    /// Speed multiplier per tick when slowing for an obstacle.
    pub obstacle_factor: f64,
    /// How far from the road edges traffic keeps.
    pub margin: f64,
    /// Speed multiplier when a vehicle is pushed back inside the margin.
    pub margin_penalty: f64,
    /// The seed for the traffic random number generator.
    pub seed: u64,
}

impl Default for TrafficAttributes {
    fn default() -> Self {
        Self {
            vehicle: VehicleAttributes {
                autonomous: true,
                sensor: None,
                ..Default::default()
            },
            classes: vec![
                ClassProfile::new(VehicleClass::Car, 30.0, 50.0, Interval::new(2.5, 3.3)),
                ClassProfile::new(VehicleClass::Truck, 40.0, 80.0, Interval::new(1.8, 2.3)),
                ClassProfile::new(VehicleClass::Motorcycle, 20.0, 40.0, Interval::new(3.5, 4.5)),
            ],
            rules: DecisionRules::default(),
            spawn_interval: 3.0,
            initial_count: 3,
            max_population: 10,
            density_probability: 0.02,
            spawn_distance: Interval::new(200.0, 1000.0),
            recycle_distance: 600.0,
            obstacle_lateral: 30.0,
            obstacle_slow_distance: 100.0,
            obstacle_stop_distance: 50.0,
            obstacle_factor: 0.85,
            margin: 20.0,
            margin_penalty: 0.9,
            seed: 0,
        }
    }
}

impl TrafficAttributes {
    /// Attributes for a road without background traffic.
    pub fn disabled() -> Self {
        Self {
            initial_count: 0,
            max_population: 0,
            density_probability: 0.0,
            ..Default::default()
        }
    }

    /// Checks that the attributes describe valid traffic.
    pub fn validate(&self) -> Result<()> {
        self.vehicle.validate()?;
        self.rules.validate()?;
        for class in &self.classes {
            class.validate(self.vehicle.max_speed)?;
        }
        if !(self.spawn_interval > 0.0) {
            return Err(ConfigError::Traffic {
                name: "spawn_interval",
                reason: format!("must be positive, got {}", self.spawn_interval),
            });
        }
        let spawn_distance = self.spawn_distance;
        if !(spawn_distance.min.is_finite()
            && spawn_distance.max.is_finite()
            && spawn_distance.is_ordered()
            && spawn_distance.min >= 0.0)
        {
            return Err(ConfigError::Traffic {
                name: "spawn_distance",
                reason: format!("{:?} is not a valid range", spawn_distance),
            });
        }
        if !(self.recycle_distance.is_finite() && self.recycle_distance >= 0.0) {
            return Err(ConfigError::Traffic {
                name: "recycle_distance",
                reason: format!("must be non-negative, got {}", self.recycle_distance),
            });
        }
        let unit = [
            ("density_probability", self.density_probability),
            ("obstacle_factor", self.obstacle_factor),
            ("margin_penalty", self.margin_penalty),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Traffic {
                    name,
                    reason: format!("must be in [0, 1], got {}", value),
                });
            }
        }
        Ok(())
    }

    /// Slows or stops a vehicle with an obstacle close ahead in its path.
    pub(crate) fn avoid_obstacles(&self, vehicle: &mut Vehicle, obstacles: &[Rect]) {
        let pos = vehicle.position();
        for obstacle in obstacles {
            let centre = obstacle.centre();
            let dx = (pos.x - centre.x).abs();
            let dy = (pos.y - centre.y).abs();
            if dx < self.obstacle_lateral && dy < self.obstacle_slow_distance {
                vehicle.scale_speed(self.obstacle_factor);
                if dy < self.obstacle_stop_distance {
                    vehicle.set_speed(0.0);
                }
            }
        }
    }

    /// Keeps a vehicle at least `margin` away from the road edges.
    pub(crate) fn keep_margin(&self, vehicle: &mut Vehicle, road: &Road) {
        let x = vehicle.position().x;
        let lane = road.bounds().shrink(self.margin);
        if lane.is_ordered() && !lane.contains(x) {
            vehicle.set_lateral(lane.clamp(x));
            vehicle.scale_speed(self.margin_penalty);
        }
    }
}

/// Spawns, drives and recycles the background traffic.
#[derive(Clone, Debug)]
pub struct TrafficController {
    attributes: TrafficAttributes,
    class_weights: WeightedIndex<f64>,
    /// Vehicles currently on the road.
    active: Vec<VehicleId>,
    /// Parked vehicles, ready to be respawned.
    pool: Vec<VehicleId>,
    /// Simulated time since the last regular spawn, in s.
    spawn_timer: f64,
    /// Whether the initial vehicles have been spawned.
    populated: bool,
    rng: StdRng,
}

impl TrafficController {
    /// Creates a new traffic controller.
    pub fn new(attributes: &TrafficAttributes) -> Result<Self> {
        attributes.validate()?;
        let class_weights = WeightedIndex::new(attributes.classes.iter().map(|c| c.weight))
            .map_err(|err| ConfigError::Traffic {
                name: "classes",
                reason: err.to_string(),
            })?;
        Ok(Self {
            attributes: attributes.clone(),
            class_weights,
            active: vec![],
            pool: vec![],
            spawn_timer: 0.0,
            populated: false,
            rng: StdRng::seed_from_u64(attributes.seed),
        })
    }

    /// The controller's attributes.
    pub fn attributes(&self) -> &TrafficAttributes {
        &self.attributes
    }

    /// The IDs of the traffic vehicles currently on the road.
    pub fn active(&self) -> &[VehicleId] {
        &self.active
    }

    /// The number of parked vehicles waiting to be reused.
    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }

    /// The total number of traffic vehicles ever allocated.
    pub fn allocated(&self) -> usize {
        self.active.len() + self.pool.len()
    }

    /// The rules and random number generator, for driving
    /// other autonomous vehicles the same way as the traffic.
    pub(crate) fn decision_parts(&mut self) -> (&DecisionRules, &mut StdRng) {
        (&self.attributes.rules, &mut self.rng)
    }

    /// Puts a traffic vehicle on the road ahead of `anchor_y`,
    /// reusing a pooled vehicle if there is one.
    ///
    /// Returns `None` if the road is already at its population cap.
    pub(crate) fn spawn(
        &mut self,
        vehicles: &mut VehicleSet,
        road: &Road,
        anchor_y: f64,
    ) -> Option<VehicleId> {
        if self.active.len() >= self.attributes.max_population {
            return None;
        }

        let profile = self.attributes.classes[self.class_weights.sample(&mut self.rng)];
        let lane = self.rng.gen_range(0..road.lane_count());
        let distance = sample(self.attributes.spawn_distance, &mut self.rng);
        let spawn = Spawn {
            class: profile.class,
            pos: Point2d::new(road.lane_center(lane as isize), anchor_y - distance),
            width: sample(profile.width, &mut self.rng),
            height: sample(profile.height, &mut self.rng),
            speed: sample(profile.speed, &mut self.rng),
        };

        let id = match self.pool.pop().filter(|id| vehicles.contains_key(*id)) {
            Some(id) => id,
            None => {
                let attributes = &self.attributes.vehicle;
                vehicles.insert_with_key(|id| Vehicle::new(id, attributes, spawn.pos))
            }
        };
        vehicles[id].respawn(&spawn);
        self.active.push(id);

        debug!(
            "spawned {:?} {:?} in lane {} at y = {:.1}",
            spawn.class, id, lane, spawn.pos.y
        );
        Some(id)
    }

    /// Spawns the initial traffic.
    pub(crate) fn populate(
        &mut self,
        vehicles: &mut VehicleSet,
        road: &Road,
        anchor_y: f64,
    ) -> SmallVec<[VehicleId; 4]> {
        self.populated = true;
        (0..self.attributes.initial_count)
            .filter_map(|_| self.spawn(vehicles, road, anchor_y))
            .collect()
    }

    /// Advances the spawn timer, spawning vehicles as they fall due.
    /// The initial traffic is spawned on the first call.
    pub(crate) fn update_spawns(
        &mut self,
        dt: f64,
        vehicles: &mut VehicleSet,
        road: &Road,
        anchor_y: f64,
    ) -> SmallVec<[VehicleId; 4]> {
        let mut spawned = if self.populated {
            SmallVec::new()
        } else {
            self.populate(vehicles, road, anchor_y)
        };

        self.spawn_timer += dt;
        if self.spawn_timer >= self.attributes.spawn_interval {
            self.spawn_timer = 0.0;
            spawned.extend(self.spawn(vehicles, road, anchor_y));
        }

        if self.rng.gen_bool(self.attributes.density_probability) {
            spawned.extend(self.spawn(vehicles, road, anchor_y));
        }

        spawned
    }

    /// Runs the per-tick driving rules of every active traffic vehicle.
    pub(crate) fn apply_rules(&mut self, vehicles: &mut VehicleSet, road: &Road, obstacles: &[Rect]) {
        let snapshot = self
            .active
            .iter()
            .filter_map(|id| vehicles.get(*id))
            .map(Vehicle::neighbour)
            .collect::<SmallVec<[Neighbour; 16]>>();

        for id in &self.active {
            let Some(vehicle) = vehicles.get_mut(*id) else {
                continue;
            };
            if vehicle.is_collided() {
                continue;
            }
            vehicle.follow_leader(&snapshot, road, &self.attributes.rules, &mut self.rng);
            self.attributes.avoid_obstacles(vehicle, obstacles);
            self.attributes.keep_margin(vehicle, road);
            vehicle.random_brake(&self.attributes.rules, &mut self.rng);
        }
    }

    /// Parks every vehicle more than `recycle_distance` behind `anchor_y`.
    /// Returns the number recycled.
    pub(crate) fn recycle(&mut self, vehicles: &mut VehicleSet, anchor_y: f64) -> usize {
        let limit = anchor_y + self.attributes.recycle_distance;
        let before = self.active.len();
        self.active.retain(|id| {
            let Some(vehicle) = vehicles.get_mut(*id) else {
                return false;
            };
            if vehicle.position().y <= limit {
                return true;
            }
            debug!("recycled {:?} at y = {:.1}", id, vehicle.position().y);
            vehicle.park();
            self.pool.push(*id);
            false
        });
        before - self.active.len()
    }
}

/// Draws a value uniformly from a closed interval.
fn sample(range: Interval<f64>, rng: &mut impl Rng) -> f64 {
    Uniform::new_inclusive(range.min, range.max).sample(rng)
}
