//! Rule-based driving for autonomous vehicles.

use super::{Neighbour, Vehicle};
use crate::error::{ConfigError, Result};
use crate::road::Road;
use arrayvec::ArrayVec;
use rand::Rng;

/// Parameters of the rule-based driving behaviour.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecisionRules {
    /// A leader closer than this may prompt a lane change.
    pub lane_change_distance: f64,
    /// The chance per tick of changing lanes while held up.
    pub lane_change_probability: f64,
    /// A leader closer than this makes the vehicle slow down.
    pub slowdown_distance: f64,
    /// Speed multiplier per tick while following closely.
    pub slowdown_factor: f64,
    /// Fraction of the gap to the cruise speed recovered per tick.
    pub recovery_rate: f64,
    /// The chance per tick of braking for no reason.
    pub brake_probability: f64,
    /// Speed multiplier for a random brake.
    pub brake_factor: f64,
}

impl Default for DecisionRules {
    fn default() -> Self {
        Self {
            lane_change_distance: 100.0,
            lane_change_probability: 0.02,
            slowdown_distance: 120.0,
            slowdown_factor: 0.98,
            recovery_rate: 0.01,
            brake_probability: 0.02,
            brake_factor: 0.75,
        }
    }
}

impl DecisionRules {
    /// Checks that the probabilities and factors are in range.
    pub fn validate(&self) -> Result<()> {
        let unit = [
            ("lane_change_probability", self.lane_change_probability),
            ("brake_probability", self.brake_probability),
            ("recovery_rate", self.recovery_rate),
            ("slowdown_factor", self.slowdown_factor),
            ("brake_factor", self.brake_factor),
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
}

impl Vehicle {
    /// Runs the decision rule of an autonomous vehicle: keep distance to
    /// the vehicle ahead, occasionally change lanes when held up, and
    /// occasionally brake unpredictably.
    pub(crate) fn make_decision(
        &mut self,
        neighbours: &[Neighbour],
        road: &Road,
        rules: &DecisionRules,
        rng: &mut impl Rng,
    ) {
        self.follow_leader(neighbours, road, rules, rng);
        self.random_brake(rules, rng);
    }

    /// Slows down behind a close leader, possibly changing lanes,
    /// otherwise recovers towards the cruise speed.
    pub(crate) fn follow_leader(
        &mut self,
        neighbours: &[Neighbour],
        road: &Road,
        rules: &DecisionRules,
        rng: &mut impl Rng,
    ) {
        if self.is_collided() {
            return;
        }

        let gap = self.leader_gap(neighbours, road);
        if gap.map_or(false, |gap| gap < rules.lane_change_distance)
            && rng.gen_bool(rules.lane_change_probability)
        {
            self.change_lane(road, rng);
        }

        if gap.map_or(false, |gap| gap < rules.slowdown_distance) {
            self.scale_speed(rules.slowdown_factor);
        } else {
            let speed = self.speed + (self.cruise_speed - self.speed) * rules.recovery_rate;
            self.set_speed(speed);
        }
    }

    /// With a small probability, brakes sharply for one tick.
    pub(crate) fn random_brake(&mut self, rules: &DecisionRules, rng: &mut impl Rng) {
        if rng.gen_bool(rules.brake_probability) {
            log::trace!("vehicle {:?} brakes unpredictably", self.id);
            self.scale_speed(rules.brake_factor);
        }
    }

    /// The distance to the nearest vehicle ahead in the same lane.
    pub(crate) fn leader_gap(&self, neighbours: &[Neighbour], road: &Road) -> Option<f64> {
        let lane = road.lane_index(self.pos.x);
        neighbours
            .iter()
            .filter(|other| other.id != self.id)
            .filter(|other| road.lane_index(other.pos.x) == lane && other.pos.y < self.pos.y)
            .map(|other| self.pos.y - other.pos.y)
            .min_by(|a, b| a.total_cmp(b))
    }

    /// Moves the vehicle to the centre of a randomly chosen adjacent lane.
    fn change_lane(&mut self, road: &Road, rng: &mut impl Rng) {
        let lane = road.lane_index(self.pos.x);
        let mut options = ArrayVec::<usize, 2>::new();
        if lane > 0 {
            options.push(lane - 1);
        }
        if lane + 1 < road.lane_count() {
            options.push(lane + 1);
        }
        if options.is_empty() {
            return;
        }
        let target = options[rng.gen_range(0..options.len())];
        log::trace!("vehicle {:?} changes lane {} -> {}", self.id, lane, target);
        self.pos.x = road.lane_center(target as isize);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::math::{Point2d, Rect};
    use crate::road::RoadAttributes;
    use crate::vehicle::VehicleAttributes;
    use crate::VehicleId;
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::mock::StepRng;
    use slotmap::KeyData;

    /// An RNG for which every `gen_bool` with a non-zero probability succeeds.
    fn always() -> StepRng {
        StepRng::new(0, 0)
    }

    /// An RNG for which every `gen_bool` with a probability below one fails.
    fn never() -> StepRng {
        StepRng::new(u64::MAX, 0)
    }

    fn road() -> Road {
        Road::new(&RoadAttributes::default()).unwrap()
    }

    fn id(n: u64) -> VehicleId {
        KeyData::from_ffi((1 << 32) | n).into()
    }

    fn autonomous(x: f64, y: f64, speed: f64) -> Vehicle {
        let attributes = VehicleAttributes {
            autonomous: true,
            cruise_speed: 3.0,
            sensor: None,
            ..Default::default()
        };
        let mut veh = Vehicle::new(id(1), &attributes, Point2d::new(x, y));
        veh.set_speed(speed);
        veh
    }

    fn neighbour(n: u64, x: f64, y: f64) -> Neighbour {
        let pos = Point2d::new(x, y);
        Neighbour {
            id: id(n),
            pos,
            footprint: Rect::centred(pos, 30.0, 50.0),
            autonomous: true,
        }
    }

    #[test]
    fn finds_nearest_leader_in_lane() {
        let road = road();
        let veh = autonomous(200.0, 500.0, 3.0);
        let neighbours = [
            neighbour(2, 200.0, 300.0),
            neighbour(3, 200.0, 420.0),
            neighbour(4, 100.0, 480.0),
            neighbour(5, 200.0, 600.0),
        ];
        assert_eq!(veh.leader_gap(&neighbours, &road), Some(80.0));
        assert_eq!(veh.leader_gap(&neighbours[2..], &road), None);
    }

    #[test]
    fn slows_behind_close_leader() {
        let road = road();
        let rules = DecisionRules::default();
        let mut veh = autonomous(200.0, 500.0, 3.0);
        veh.make_decision(&[neighbour(2, 200.0, 390.0)], &road, &rules, &mut never());
        assert_approx_eq!(veh.speed(), 3.0 * 0.98);
        assert_eq!(veh.position().x, 200.0);
    }

    #[test]
    fn changes_to_adjacent_lane_when_lucky() {
        let road = road();
        let rules = DecisionRules {
            brake_probability: 0.0,
            ..Default::default()
        };
        let mut veh = autonomous(200.0, 500.0, 3.0);
        veh.make_decision(&[neighbour(2, 200.0, 450.0)], &road, &rules, &mut always());
        let lane = road.lane_index(veh.position().x);
        assert_ne!(lane, 1);
        assert_eq!(veh.position().x, road.lane_center(lane as isize));

        // The rightmost lane only has one neighbour
        let mut veh = autonomous(300.0, 500.0, 3.0);
        veh.make_decision(&[neighbour(2, 300.0, 450.0)], &road, &rules, &mut always());
        assert_eq!(veh.position().x, 200.0);
    }

    #[test]
    fn recovers_towards_cruise_speed() {
        let road = road();
        let rules = DecisionRules::default();
        let mut veh = autonomous(200.0, 500.0, 1.0);
        let mut last = veh.speed();
        for _ in 0..500 {
            veh.make_decision(&[], &road, &rules, &mut never());
            assert!(veh.speed() >= last);
            assert!(veh.speed() <= 3.0);
            last = veh.speed();
        }
        assert!(veh.speed() > 2.9);
    }

    #[test]
    fn random_brake() {
        let rules = DecisionRules::default();
        let mut veh = autonomous(200.0, 500.0, 2.0);
        veh.random_brake(&rules, &mut always());
        assert_approx_eq!(veh.speed(), 1.5);
        veh.random_brake(&rules, &mut never());
        assert_approx_eq!(veh.speed(), 1.5);
    }

    #[test]
    fn rejects_out_of_range_probability() {
        let rules = DecisionRules {
            brake_probability: 1.5,
            ..Default::default()
        };
        assert!(rules.validate().is_err());
    }
}
