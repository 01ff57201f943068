//! A kinematic simulation of vehicles on a straight, multi-lane road,
//! with ray-casting proximity sensors and rule-driven background traffic.

pub use cgmath;
pub use collision::{CollisionMode, Contact};
pub use error::{ConfigError, Result};
pub use obstacle::{Footprint, Obstacle};
pub use road::{Road, RoadAttributes};
pub use sensor::{SensorArray, SensorAttributes};
pub use simulation::{Simulation, SimulationAttributes};
use slotmap::{new_key_type, SlotMap};
pub use slotmap::{Key, KeyData};
pub use traffic::{ClassProfile, TrafficAttributes, TrafficController};
pub use util::Interval;
pub use vehicle::{
    Controls, DecisionRules, Vehicle, VehicleAttributes, VehicleClass, VehicleState,
};

pub mod collision;
mod debug;
mod error;
pub mod math;
mod obstacle;
mod road;
mod sensor;
mod simulation;
mod traffic;
mod util;
mod vehicle;

new_key_type! {
    /// Unique ID of a [Vehicle].
    pub struct VehicleId;
    /// Unique ID of an [Obstacle].
    pub struct ObstacleId;
}

type VehicleSet = SlotMap<VehicleId, Vehicle>;
type ObstacleSet = SlotMap<ObstacleId, Obstacle>;
