//! Collision detection between vehicles, static obstacles and the road edges.
//!
//! Detection is a pure function of a vehicle's footprint and a snapshot of
//! everything around it, so it can run either inline on the simulation thread
//! or on a [`CollisionWorker`] thread.

use crate::math::Rect;
use crate::obstacle::Footprint;
use crate::road::Road;
use crate::util::Interval;
use crate::vehicle::Vehicle;

pub use worker::{CollisionGate, CollisionRequest, CollisionResponse, CollisionWorker};

mod worker;

/// Tolerance when testing a footprint against the road edges.
/// Vehicles clamped exactly onto an edge are not in contact with it.
const BOUNDARY_EPSILON: f64 = 1e-9;

/// What a vehicle collided with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Contact {
    /// The vehicle crossed a road edge.
    Boundary,
    /// The vehicle overlaps the neighbour at the given index.
    Vehicle(usize),
    /// The vehicle overlaps the obstacle at the given index.
    Obstacle(usize),
}

/// Where collision checks for the primary vehicles are run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CollisionMode {
    /// Checked on the simulation thread during each step.
    #[default]
    Inline,
    /// Checked on a background thread; results are applied on the next step.
    Offloaded,
}

/// Finds the first thing the footprint touches.
///
/// The road edges are checked first, then each neighbour, then each obstacle.
/// Overlaps are strict, so rectangles that only share an edge don't collide.
pub fn detect(
    footprint: &Rect,
    bounds: Interval<f64>,
    neighbours: &[Rect],
    obstacles: &[Rect],
) -> Option<Contact> {
    let horizontal = footprint.horizontal();
    if horizontal.min < bounds.min - BOUNDARY_EPSILON
        || horizontal.max > bounds.max + BOUNDARY_EPSILON
    {
        return Some(Contact::Boundary);
    }
    if let Some(idx) = neighbours.iter().position(|other| footprint.overlaps(other)) {
        return Some(Contact::Vehicle(idx));
    }
    obstacles
        .iter()
        .position(|other| footprint.overlaps(other))
        .map(Contact::Obstacle)
}

/// Returns true if the vehicle touches a road edge, a neighbour or an obstacle.
pub fn check_vehicle(vehicle: &Vehicle, neighbours: &[Rect], obstacles: &[Rect], road: &Road) -> bool {
    detect(&vehicle.footprint(), road.bounds(), neighbours, obstacles).is_some()
}
