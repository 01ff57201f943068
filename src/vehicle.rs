use self::dynamics::{Dynamics, ModelParams};
use crate::error::{ConfigError, Result};
use crate::math::{heading_vector, Point2d, Rect};
use crate::obstacle::Footprint;
use crate::road::Road;
use crate::sensor::SensorAttributes;
use crate::VehicleId;
use std::collections::VecDeque;

pub use decision::DecisionRules;

mod decision;
mod dynamics;

/// The number of past positions kept in a vehicle's trail.
const TRAIL_LEN: usize = 100;

/// A simulated vehicle.
#[derive(Clone, Debug)]
pub struct Vehicle {
    /// The vehicle's ID
    pub(crate) id: VehicleId,
    /// Half the vehicle's width.
    half_wid: f64,
    /// Half the vehicle's length.
    half_len: f64,
    /// The kinematic model
    dynamics: Dynamics,
    /// Speed multiplier applied when the vehicle scrapes a road edge.
    boundary_penalty: f64,
    /// Whether the vehicle is driven by rules rather than controls.
    autonomous: bool,
    /// Whether the vehicle belongs to the traffic controller.
    pub(crate) traffic: bool,
    /// Whether the vehicle is parked in the traffic pool.
    pub(crate) pooled: bool,
    /// The vehicle class, used by renderers to pick a colour.
    class: VehicleClass,
    /// The world space coordinates of the centre of the vehicle.
    pos: Point2d,
    /// The heading in radians, zero pointing up the screen.
    angle: f64,
    /// The signed speed per tick.
    speed: f64,
    /// The speed autonomous vehicles return to when unobstructed.
    cruise_speed: f64,
    /// The pose restored by [Vehicle::reset].
    initial_pos: Point2d,
    /// The current control inputs.
    controls: Controls,
    /// Whether the vehicle is driving or wrecked.
    state: VehicleState,
    /// Ticks spent in the collided state.
    flash: usize,
    /// Where the vehicle was when it last collided.
    collision_point: Option<Point2d>,
    /// Recent positions, oldest first.
    trail: VecDeque<Point2d>,
}

/// The attributes of a simulated vehicle.
///
/// Speeds and rates are per simulation tick.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VehicleAttributes {
    /// The width of the collision box.
    pub width: f64,
    /// The length of the collision box.
    pub height: f64,
    /// Speed gained per tick while accelerating.
    pub acceleration: f64,
    /// The maximum forward speed.
    pub max_speed: f64,
    /// The maximum reverse speed, zero or negative.
    pub max_reverse_speed: f64,
    /// Speed lost per tick while coasting.
    pub friction: f64,
    /// Speed lost per tick while braking from forward motion.
    pub braking_power: f64,
    /// Heading change per tick at full speed, in radians.
    pub turning_rate: f64,
    /// Surface grip in `[0, 1]`.
    pub grip: f64,
    /// Extra turning per tick at zero grip, in radians.
    pub slip: f64,
    /// The vehicle doesn't turn at or below this speed.
    pub min_turn_speed: f64,
    /// Speed multiplier applied when the vehicle is pushed back onto the road.
    pub boundary_penalty: f64,
    /// Whether the vehicle drives itself using the decision rules.
    pub autonomous: bool,
    /// The speed an autonomous vehicle returns to when unobstructed.
    pub cruise_speed: f64,
    /// The sensor array fitted to the vehicle, if any.
    pub sensor: Option<SensorAttributes>,
}

impl Default for VehicleAttributes {
    fn default() -> Self {
        Self {
            width: 30.0,
            height: 50.0,
            acceleration: 0.2,
            max_speed: 5.0,
            max_reverse_speed: -2.5,
            friction: 0.05,
            braking_power: 0.3,
            turning_rate: 0.03,
            grip: 1.0,
            slip: 0.02,
            min_turn_speed: 0.05,
            boundary_penalty: 0.9,
            autonomous: false,
            cruise_speed: 3.0,
            sensor: Some(SensorAttributes::default()),
        }
    }
}

impl VehicleAttributes {
    /// Checks that the attributes describe a valid vehicle.
    pub fn validate(&self) -> Result<()> {
        if !(self.width > 0.0 && self.height > 0.0) {
            return Err(ConfigError::Footprint {
                width: self.width,
                height: self.height,
            });
        }
        if !(self.max_reverse_speed <= 0.0 && self.max_speed > 0.0) {
            return Err(ConfigError::SpeedLimits {
                min: self.max_reverse_speed,
                max: self.max_speed,
            });
        }
        let non_negative = [
            ("acceleration", self.acceleration),
            ("friction", self.friction),
            ("braking_power", self.braking_power),
            ("turning_rate", self.turning_rate),
            ("slip", self.slip),
            ("min_turn_speed", self.min_turn_speed),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Vehicle {
                    name,
                    reason: format!("must be non-negative, got {}", value),
                });
            }
        }
        let unit = [("grip", self.grip), ("boundary_penalty", self.boundary_penalty)];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Vehicle {
                    name,
                    reason: format!("must be in [0, 1], got {}", value),
                });
            }
        }
        if let Some(sensor) = &self.sensor {
            sensor.validate()?;
        }
        Ok(())
    }
}

/// The control inputs of a vehicle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Controls {
    pub forward: bool,
    pub brake: bool,
    pub left: bool,
    pub right: bool,
}

impl Controls {
    /// The steering input: -1 for left, +1 for right, 0 for neither or both.
    pub fn steering(&self) -> f64 {
        match (self.left, self.right) {
            (true, false) => -1.0,
            (false, true) => 1.0,
            _ => 0.0,
        }
    }
}

/// The collision state of a vehicle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VehicleState {
    Active,
    Collided,
}

/// The class of a vehicle, which determines its size, speed and colour.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VehicleClass {
    #[default]
    Car,
    Truck,
    Motorcycle,
}

/// A read-only view of a vehicle taken at the start of a simulation phase.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Neighbour {
    pub id: VehicleId,
    pub pos: Point2d,
    pub footprint: Rect,
    pub autonomous: bool,
}

impl Vehicle {
    /// Creates a new vehicle at the given position, facing up the road.
    pub(crate) fn new(id: VehicleId, attributes: &VehicleAttributes, pos: Point2d) -> Self {
        Self {
            id,
            half_wid: 0.5 * attributes.width,
            half_len: 0.5 * attributes.height,
            dynamics: Dynamics::new(&ModelParams {
                acceleration: attributes.acceleration,
                max_speed: attributes.max_speed,
                max_reverse_speed: attributes.max_reverse_speed,
                friction: attributes.friction,
                braking_power: attributes.braking_power,
                turning_rate: attributes.turning_rate,
                grip: attributes.grip,
                slip: attributes.slip,
                min_turn_speed: attributes.min_turn_speed,
            }),
            boundary_penalty: attributes.boundary_penalty,
            autonomous: attributes.autonomous,
            traffic: false,
            pooled: false,
            class: VehicleClass::default(),
            pos,
            angle: 0.0,
            speed: 0.0,
            cruise_speed: attributes.cruise_speed,
            initial_pos: pos,
            controls: Controls::default(),
            state: VehicleState::Active,
            flash: 0,
            collision_point: None,
            trail: VecDeque::with_capacity(TRAIL_LEN),
        }
    }

    /// Gets the vehicle's ID.
    pub fn id(&self) -> VehicleId {
        self.id
    }

    /// The vehicle's width.
    pub fn width(&self) -> f64 {
        2.0 * self.half_wid
    }

    /// The vehicle's length.
    pub fn height(&self) -> f64 {
        2.0 * self.half_len
    }

    /// The coordinates in world space of the centre of the vehicle.
    pub fn position(&self) -> Point2d {
        self.pos
    }

    /// The heading in radians. Zero points up the screen, positive is clockwise.
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// The signed speed per tick.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// The speed an autonomous vehicle returns to when unobstructed.
    pub fn cruise_speed(&self) -> f64 {
        self.cruise_speed
    }

    /// The maximum forward speed.
    pub fn max_speed(&self) -> f64 {
        self.dynamics.speed_limits().max
    }

    /// The maximum reverse speed, zero or negative.
    pub fn max_reverse_speed(&self) -> f64 {
        self.dynamics.speed_limits().min
    }

    /// Whether the vehicle drives itself.
    pub fn is_autonomous(&self) -> bool {
        self.autonomous
    }

    /// Whether the vehicle is part of the simulated traffic.
    pub fn is_traffic(&self) -> bool {
        self.traffic
    }

    /// The vehicle's class.
    pub fn class(&self) -> VehicleClass {
        self.class
    }

    /// The current control inputs.
    pub fn controls(&self) -> Controls {
        self.controls
    }

    /// The vehicle's collision state.
    pub fn state(&self) -> VehicleState {
        self.state
    }

    /// Whether the vehicle has collided.
    pub fn is_collided(&self) -> bool {
        self.state == VehicleState::Collided
    }

    /// The number of ticks spent collided, used to flash the wreck.
    pub fn flash_counter(&self) -> usize {
        self.flash
    }

    /// Where the vehicle was when it collided, if it has.
    pub fn collision_point(&self) -> Option<Point2d> {
        self.collision_point
    }

    /// Recent positions of the vehicle, oldest first.
    pub fn trail(&self) -> impl Iterator<Item = Point2d> + '_ {
        self.trail.iter().copied()
    }

    /// Stores new control inputs. They take effect on the next tick.
    pub fn set_controls(&mut self, controls: Controls) {
        self.controls = controls;
    }

    /// Sets the speed, clamped to the vehicle's limits.
    /// Has no effect on a collided vehicle.
    pub fn set_speed(&mut self, speed: f64) {
        if !self.is_collided() {
            self.speed = self.dynamics.speed_limits().clamp(speed);
        }
    }

    /// Multiplies the speed by `factor`.
    pub(crate) fn scale_speed(&mut self, factor: f64) {
        self.set_speed(self.speed * factor);
    }

    /// Moves the vehicle sideways to the given x coordinate.
    pub(crate) fn set_lateral(&mut self, x: f64) {
        if !self.is_collided() {
            self.pos.x = x;
        }
    }

    /// Restores the initial pose and clears the collision state.
    pub fn reset(&mut self) {
        self.pos = self.initial_pos;
        self.angle = 0.0;
        self.speed = 0.0;
        self.controls = Controls::default();
        self.state = VehicleState::Active;
        self.flash = 0;
        self.collision_point = None;
        self.trail.clear();
    }

    /// Reinitialises a pooled traffic vehicle as a fresh one.
    pub(crate) fn respawn(&mut self, spawn: &Spawn) {
        self.half_wid = 0.5 * spawn.width;
        self.half_len = 0.5 * spawn.height;
        self.class = spawn.class;
        self.initial_pos = spawn.pos;
        self.cruise_speed = spawn.speed;
        self.traffic = true;
        self.pooled = false;
        self.reset();
        self.set_speed(spawn.speed);
    }

    /// Takes the vehicle out of service and parks it in the traffic pool.
    pub(crate) fn park(&mut self) {
        self.reset();
        self.pooled = true;
    }

    /// Advances the vehicle by one tick: throttle and brake, friction, steering,
    /// position and road edge enforcement.
    ///
    /// A collided vehicle doesn't move; only its flash counter advances.
    pub(crate) fn integrate(&mut self, road: &Road) {
        if self.is_collided() {
            self.flash += 1;
            return;
        }

        self.speed = self
            .dynamics
            .update_speed(self.speed, &self.controls, !self.autonomous);
        self.angle = self
            .dynamics
            .update_heading(self.angle, self.speed, &self.controls);
        self.pos += heading_vector(self.angle) * self.speed;
        self.enforce_boundaries(road);

        if self.trail.len() == TRAIL_LEN {
            self.trail.pop_front();
        }
        self.trail.push_back(self.pos);
    }

    /// Pushes the vehicle back onto the road if its footprint crosses an edge,
    /// scrubbing off some speed.
    fn enforce_boundaries(&mut self, road: &Road) {
        let x = road.bounds().shrink(self.half_wid).clamp(self.pos.x);
        if x != self.pos.x {
            self.pos.x = x;
            self.speed *= self.boundary_penalty;
        }
    }

    /// Marks the vehicle as collided and brings it to a halt.
    pub(crate) fn collide(&mut self) {
        if self.is_collided() {
            return;
        }
        log::debug!("vehicle {:?} collided at {:?}", self.id, self.pos);
        self.state = VehicleState::Collided;
        self.speed = 0.0;
        self.collision_point = Some(self.pos);
    }

    /// Takes a read-only snapshot of the vehicle.
    pub(crate) fn neighbour(&self) -> Neighbour {
        Neighbour {
            id: self.id,
            pos: self.pos,
            footprint: self.footprint(),
            autonomous: self.autonomous,
        }
    }
}

impl Footprint for Vehicle {
    fn footprint(&self) -> Rect {
        Rect::centred(self.pos, self.width(), self.height())
    }
}

/// Where and how a traffic vehicle (re)enters the simulation.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Spawn {
    pub class: VehicleClass,
    pub pos: Point2d,
    pub width: f64,
    pub height: f64,
    pub speed: f64,
}
