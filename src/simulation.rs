use crate::collision::{
    check_vehicle, CollisionGate, CollisionMode, CollisionRequest, CollisionResponse,
    CollisionWorker,
};
use crate::debug::{debug_point, debug_rect};
#[cfg(feature = "debug")]
use crate::debug::take_debug_frame;
use crate::error::Result;
use crate::math::{Point2d, Rect};
use crate::obstacle::{Footprint, Obstacle};
use crate::road::{Road, RoadAttributes};
use crate::sensor::SensorArray;
use crate::traffic::{TrafficAttributes, TrafficController};
use crate::vehicle::{Controls, Neighbour, Vehicle, VehicleAttributes};
use crate::{ObstacleId, ObstacleSet, VehicleId, VehicleSet};
use itertools::Itertools;
use log::{debug, trace};
use slotmap::SecondaryMap;
use smallvec::SmallVec;
use std::time::{Duration, Instant};

type Snapshot = SmallVec<[Neighbour; 16]>;

/// The attributes of a simulation.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimulationAttributes {
    /// The road layout.
    pub road: RoadAttributes,
    /// The background traffic.
    pub traffic: TrafficAttributes,
    /// Whether autonomous vehicles can collide. When `false`, only
    /// manually driven vehicles are checked for collisions.
    pub traffic_collisions: bool,
    /// Where collision checks for vehicles added with
    /// [`Simulation::add_vehicle`] are run.
    pub collision_mode: CollisionMode,
}

/// A simulation of vehicles on a straight, multi-lane road.
pub struct Simulation {
    /// The road.
    road: Road,
    /// Every vehicle, including pooled traffic.
    vehicles: VehicleSet,
    /// Sensor arrays, keyed by the vehicle they're fitted to.
    sensors: SecondaryMap<VehicleId, SensorArray>,
    /// The static obstacles.
    obstacles: ObstacleSet,
    /// The background traffic.
    traffic: TrafficController,
    /// The vehicle the traffic and the viewport are anchored to.
    reference: Option<VehicleId>,
    /// Whether autonomous vehicles can collide.
    traffic_collisions: bool,
    /// The background collision checker, in offloaded mode.
    worker: Option<CollisionWorker>,
    /// Tracks which offloaded results are still current, per vehicle.
    gates: SecondaryMap<VehicleId, CollisionGate>,
    /// The number of offloaded requests awaiting a response.
    pending: usize,
    /// The current frame of simulation.
    frame: usize,
    /// The simulated time in s.
    time: f64,
    /// Debugging information from the previously simulated frame.
    #[cfg(feature = "debug")]
    debug: serde_json::Value,
}

impl Simulation {
    /// Creates a new simulation.
    pub fn new(attributes: &SimulationAttributes) -> Result<Self> {
        let worker = match attributes.collision_mode {
            CollisionMode::Inline => None,
            CollisionMode::Offloaded => Some(CollisionWorker::spawn()),
        };
        Ok(Self {
            road: Road::new(&attributes.road)?,
            vehicles: VehicleSet::with_key(),
            sensors: SecondaryMap::new(),
            obstacles: ObstacleSet::with_key(),
            traffic: TrafficController::new(&attributes.traffic)?,
            reference: None,
            traffic_collisions: attributes.traffic_collisions,
            worker,
            gates: SecondaryMap::new(),
            pending: 0,
            frame: 0,
            time: 0.0,
            #[cfg(feature = "debug")]
            debug: serde_json::Value::Null,
        })
    }

    /// Adds a vehicle to the simulation, fitted with a sensor if its attributes ask for one.
    ///
    /// The first vehicle added becomes the reference vehicle.
    pub fn add_vehicle(&mut self, attributes: &VehicleAttributes, pos: Point2d) -> Result<VehicleId> {
        attributes.validate()?;
        let id = self
            .vehicles
            .insert_with_key(|id| Vehicle::new(id, attributes, pos));
        if let Some(sensor) = &attributes.sensor {
            match SensorArray::new(id, sensor) {
                Ok(sensor) => {
                    self.sensors.insert(id, sensor);
                }
                Err(err) => {
                    self.vehicles.remove(id);
                    return Err(err);
                }
            }
        }
        self.gates.insert(id, CollisionGate::default());
        if self.reference.is_none() {
            self.reference = Some(id);
        }
        debug!("added vehicle {:?} at {:?}", id, pos);
        Ok(id)
    }

    /// Sets the vehicle the traffic and the viewport follow.
    pub fn set_reference(&mut self, id: VehicleId) {
        if self.vehicles.contains_key(id) {
            self.reference = Some(id);
        }
    }

    /// The vehicle the traffic and the viewport follow.
    pub fn reference(&self) -> Option<VehicleId> {
        self.reference
    }

    /// Adds a static obstacle.
    pub fn add_obstacle(&mut self, obstacle: Obstacle) -> ObstacleId {
        self.obstacles.insert(obstacle)
    }

    /// Removes a static obstacle.
    pub fn remove_obstacle(&mut self, id: ObstacleId) -> Option<Obstacle> {
        self.obstacles.remove(id)
    }

    /// Sets the control inputs of a vehicle. They take effect on the next step.
    pub fn set_controls(&mut self, id: VehicleId, controls: Controls) {
        if let Some(vehicle) = self.vehicles.get_mut(id) {
            vehicle.set_controls(controls);
        }
    }

    /// Puts a vehicle back at its starting position, clears its sensor
    /// and discards any collision results still in flight for it.
    pub fn reset_vehicle(&mut self, id: VehicleId) {
        let Some(vehicle) = self.vehicles.get_mut(id) else {
            return;
        };
        vehicle.reset();
        if let Some(sensor) = self.sensors.get_mut(id) {
            sensor.reset();
        }
        if let Some(gate) = self.gates.get_mut(id) {
            gate.invalidate();
        }
        debug!("reset vehicle {:?}", id);
    }

    /// Advances the simulation by `dt` seconds.
    ///
    /// Vehicle motion advances by one tick per call; `dt` drives
    /// the spawn timer and sensor throttling.
    pub fn step(&mut self, dt: f64) {
        self.apply_collision_responses();
        self.update_traffic(dt);
        self.integrate();

        let snapshot = self.snapshot();
        let obstacles = self.obstacle_footprints();
        self.update_sensors(&snapshot, &obstacles, dt);
        self.check_collisions(&snapshot, &obstacles);

        self.recycle_traffic();
        if let Some(pos) = self.reference_position() {
            self.road.set_scroll_offset(pos.y);
        }

        self.frame += 1;
        self.time += dt;

        #[cfg(feature = "debug")]
        {
            self.debug = take_debug_frame();
        }
    }

    /// Waits until every offloaded collision check has been answered,
    /// or until `timeout` has elapsed, and applies the results.
    ///
    /// Returns true if nothing is left outstanding.
    pub fn sync_collisions(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.pending > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let Some(response) = self.worker.as_ref().and_then(|w| w.recv_timeout(remaining)) else {
                break;
            };
            self.pending -= 1;
            apply_collision_response(&mut self.vehicles, &mut self.gates, response);
        }
        self.pending == 0
    }

    /// Gets the current simulation frame index.
    pub fn frame(&self) -> usize {
        self.frame
    }

    /// Gets the simulated time in seconds.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Gets a reference to the vehicle with the given ID.
    pub fn get_vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(id)
    }

    /// Returns an iterator over all the vehicles on the road.
    pub fn iter_vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values().filter(|vehicle| !vehicle.pooled)
    }

    /// Returns an iterator over the traffic vehicles on the road.
    pub fn iter_traffic(&self) -> impl Iterator<Item = &Vehicle> {
        self.traffic
            .active()
            .iter()
            .filter_map(|id| self.vehicles.get(*id))
    }

    /// Returns an iterator over the static obstacles.
    pub fn iter_obstacles(&self) -> impl Iterator<Item = (ObstacleId, &Obstacle)> {
        self.obstacles.iter()
    }

    /// Gets the road.
    pub fn road(&self) -> &Road {
        &self.road
    }

    /// Gets the sensor fitted to a vehicle, if any.
    pub fn sensor(&self, id: VehicleId) -> Option<&SensorArray> {
        self.sensors.get(id)
    }

    /// Gets the traffic controller.
    pub fn traffic(&self) -> &TrafficController {
        &self.traffic
    }

    /// Gets the debugging information for the previously simulated frame as JSON array.
    #[cfg(feature = "debug")]
    pub fn debug(&mut self) -> serde_json::Value {
        self.debug.clone()
    }

    fn reference_position(&self) -> Option<Point2d> {
        self.reference
            .and_then(|id| self.vehicles.get(id))
            .map(Vehicle::position)
    }

    /// Applies the offloaded collision results that have arrived since the last step.
    fn apply_collision_responses(&mut self) {
        let Some(worker) = &self.worker else {
            return;
        };
        let responses = worker.drain().collect_vec();
        self.pending = self.pending.saturating_sub(responses.len());
        for response in responses {
            apply_collision_response(&mut self.vehicles, &mut self.gates, response);
        }
    }

    /// Spawns traffic, then runs the driving rules of every autonomous vehicle.
    fn update_traffic(&mut self, dt: f64) {
        if let Some(anchor) = self.reference_position() {
            let spawned = self
                .traffic
                .update_spawns(dt, &mut self.vehicles, &self.road, anchor.y);
            if let Some(attributes) = &self.traffic.attributes().vehicle.sensor {
                for id in spawned {
                    match self.sensors.get_mut(id) {
                        Some(sensor) => sensor.reset(),
                        None => {
                            if let Ok(sensor) = SensorArray::new(id, attributes) {
                                self.sensors.insert(id, sensor);
                            }
                        }
                    }
                }
            }
        }

        let obstacles = self.obstacle_footprints();
        self.traffic
            .apply_rules(&mut self.vehicles, &self.road, &obstacles);

        let traffic = self
            .traffic
            .active()
            .iter()
            .filter_map(|id| self.vehicles.get(*id))
            .map(Vehicle::neighbour)
            .collect::<Snapshot>();
        let (rules, rng) = self.traffic.decision_parts();
        for vehicle in self.vehicles.values_mut() {
            if vehicle.is_autonomous() && !vehicle.traffic && !vehicle.is_collided() {
                vehicle.make_decision(&traffic, &self.road, rules, rng);
            }
        }
    }

    /// Moves every vehicle on the road by one tick.
    fn integrate(&mut self) {
        for vehicle in self.vehicles.values_mut() {
            if !vehicle.pooled {
                vehicle.integrate(&self.road);
            }
        }
    }

    /// Takes a snapshot of every vehicle on the road.
    fn snapshot(&self) -> Snapshot {
        self.iter_vehicles().map(Vehicle::neighbour).collect()
    }

    fn obstacle_footprints(&self) -> SmallVec<[Rect; 8]> {
        self.obstacles.values().map(Footprint::footprint).collect()
    }

    /// Re-casts every sensor fitted to a vehicle on the road.
    fn update_sensors(&mut self, snapshot: &[Neighbour], obstacles: &[Rect], dt: f64) {
        for (id, sensor) in &mut self.sensors {
            let on_road = self.vehicles.get(id).map_or(false, |v| !v.pooled);
            if on_road {
                sensor.update(&self.vehicles, snapshot, obstacles, &self.road, dt);
            }
        }
    }

    /// Checks every vehicle subject to collisions against the road edges,
    /// the other vehicles and the obstacles.
    fn check_collisions(&mut self, snapshot: &[Neighbour], obstacles: &[Rect]) {
        let bounds = self.road.bounds();
        let mut hits = SmallVec::<[VehicleId; 4]>::new();

        for subject in snapshot {
            let vehicle = &self.vehicles[subject.id];
            if vehicle.is_collided() || (subject.autonomous && !self.traffic_collisions) {
                continue;
            }
            let neighbours = snapshot
                .iter()
                .filter(|other| other.id != subject.id)
                .map(|other| other.footprint)
                .collect::<SmallVec<[Rect; 16]>>();

            if let (Some(worker), false) = (&self.worker, vehicle.traffic) {
                if let Some(gate) = self.gates.get_mut(subject.id) {
                    let (epoch, seq) = gate.next_request();
                    let submitted = worker.submit(CollisionRequest {
                        vehicle: subject.id,
                        epoch,
                        seq,
                        footprint: subject.footprint,
                        bounds,
                        neighbours: neighbours.to_vec(),
                        obstacles: obstacles.to_vec(),
                    });
                    if submitted {
                        self.pending += 1;
                    }
                }
                continue;
            }

            if check_vehicle(vehicle, &neighbours, obstacles, &self.road) {
                trace!("{:?} collided", subject.id);
                hits.push(subject.id);
            }
        }

        for id in hits {
            let vehicle = &mut self.vehicles[id];
            vehicle.collide();
            debug_rect("collision", &vehicle.footprint());
            debug_point("collision point", vehicle.position());
        }
    }

    /// Recycles traffic that has fallen too far behind the reference vehicle.
    fn recycle_traffic(&mut self) {
        if let Some(anchor) = self.reference_position() {
            let recycled = self.traffic.recycle(&mut self.vehicles, anchor.y);
            if recycled > 0 {
                trace!("recycled {} traffic vehicles", recycled);
            }
        }
    }
}

/// Applies an offloaded collision result if it is still current.
fn apply_collision_response(
    vehicles: &mut VehicleSet,
    gates: &mut SecondaryMap<VehicleId, CollisionGate>,
    response: CollisionResponse,
) {
    let Some(gate) = gates.get_mut(response.vehicle) else {
        return;
    };
    if !gate.accept(&response) {
        trace!(
            "dropped stale collision result for {:?} (epoch {}, #{})",
            response.vehicle,
            response.epoch,
            response.seq
        );
        return;
    }
    if let (Some(contact), Some(vehicle)) = (response.contact, vehicles.get_mut(response.vehicle)) {
        trace!("{:?} hit {:?}", response.vehicle, contact);
        vehicle.collide();
        debug_point("collision point", vehicle.position());
    }
}
