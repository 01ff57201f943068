//! End-to-end scenarios on a three lane road.

use assert_approx_eq::assert_approx_eq;
use lane_sim::{
    math::Point2d, ClassProfile, CollisionMode, Controls, DecisionRules, Interval, Obstacle,
    Simulation, SimulationAttributes, TrafficAttributes, VehicleAttributes, VehicleClass,
    VehicleId, VehicleState,
};
use std::time::Duration;

const DT: f64 = 1.0 / 60.0;

/// A simulation with no background traffic.
fn empty_road() -> SimulationAttributes {
    SimulationAttributes {
        traffic: TrafficAttributes::disabled(),
        ..Default::default()
    }
}

fn forward() -> Controls {
    Controls {
        forward: true,
        ..Default::default()
    }
}

fn add_player(sim: &mut Simulation, x: f64, y: f64) -> VehicleId {
    sim.add_vehicle(&VehicleAttributes::default(), Point2d::new(x, y))
        .unwrap()
}

/// Test that a 300 unit, three lane road centred on 200 has the expected lanes.
#[test]
fn lane_layout() {
    let sim = Simulation::new(&empty_road()).unwrap();
    let road = sim.road();
    assert_approx_eq!(road.left_boundary(), 50.0);
    assert_approx_eq!(road.right_boundary(), 350.0);
    assert_approx_eq!(road.lane_width(), 100.0);
    let centres = road.lane_centers().collect::<Vec<_>>();
    assert_eq!(centres, [100.0, 200.0, 300.0]);
}

/// Test that holding forward for ten ticks reaches speed 2.0 and moves the player 11 units up.
#[test]
fn player_accelerates_up_the_road() {
    let mut sim = Simulation::new(&empty_road()).unwrap();
    let player = add_player(&mut sim, 200.0, 500.0);
    sim.set_controls(player, forward());
    for _ in 0..10 {
        sim.step(DT);
    }
    let vehicle = sim.get_vehicle(player).unwrap();
    assert_approx_eq!(vehicle.speed(), 2.0);
    assert_approx_eq!(vehicle.position().x, 200.0);
    assert_approx_eq!(vehicle.position().y, 489.0);
    assert_eq!(vehicle.trail().count(), 10);
    assert_eq!(sim.frame(), 10);
    assert_approx_eq!(sim.road().scroll_offset(), 489.0);
}

/// Test that a player steering into the edge is held on the road without colliding.
#[test]
fn player_stays_on_the_road() {
    let mut sim = Simulation::new(&empty_road()).unwrap();
    let player = add_player(&mut sim, 200.0, 500.0);
    sim.set_controls(
        player,
        Controls {
            forward: true,
            right: true,
            ..Default::default()
        },
    );
    for _ in 0..1000 {
        sim.step(DT);
        let vehicle = sim.get_vehicle(player).unwrap();
        let x = vehicle.position().x;
        assert!(x >= 65.0 - 1e-9 && x <= 335.0 + 1e-9, "x = {}", x);
        assert!(vehicle.speed() <= vehicle.max_speed());
        assert!(vehicle.speed() >= vehicle.max_reverse_speed());
        assert!(!vehicle.is_collided());
    }
}

/// Test that a player driving into an obstacle is frozen until it is reset.
#[test]
fn crash_into_obstacle_and_reset() {
    let mut sim = Simulation::new(&empty_road()).unwrap();
    let player = add_player(&mut sim, 200.0, 500.0);
    sim.add_obstacle(Obstacle::centred(Point2d::new(200.0, 400.0), 40.0, 40.0));
    sim.set_controls(player, forward());

    for _ in 0..100 {
        sim.step(DT);
        if sim.get_vehicle(player).unwrap().is_collided() {
            break;
        }
    }
    let vehicle = sim.get_vehicle(player).unwrap();
    assert_eq!(vehicle.state(), VehicleState::Collided);
    assert_eq!(vehicle.speed(), 0.0);
    let crash_pos = vehicle.position();
    assert_eq!(vehicle.collision_point(), Some(crash_pos));

    // Frozen in place while the flash counter runs
    for _ in 0..10 {
        sim.step(DT);
    }
    let vehicle = sim.get_vehicle(player).unwrap();
    assert_eq!(vehicle.position(), crash_pos);
    assert_eq!(vehicle.flash_counter(), 10);

    sim.reset_vehicle(player);
    let vehicle = sim.get_vehicle(player).unwrap();
    assert_eq!(vehicle.state(), VehicleState::Active);
    assert_eq!(vehicle.position(), Point2d::new(200.0, 500.0));
    assert_eq!(vehicle.flash_counter(), 0);
    assert_eq!(vehicle.collision_point(), None);
    assert!(sim.sensor(player).unwrap().smoothed().iter().all(|r| *r == 1.0));
}

/// Test that the middle ray measures the distance to an obstacle straight ahead.
#[test]
fn sensor_sees_obstacle_ahead() {
    let mut sim = Simulation::new(&empty_road()).unwrap();
    let player = add_player(&mut sim, 200.0, 500.0);
    // The obstacle's near edge is 100 units ahead
    sim.add_obstacle(Obstacle::centred(Point2d::new(200.0, 380.0), 40.0, 40.0));
    sim.step(DT);

    let sensor = sim.sensor(player).unwrap();
    assert_eq!(sensor.owner(), player);
    assert_eq!(sensor.rays().len(), 5);
    assert_approx_eq!(sensor.readings()[2], 100.0 / 150.0);
    assert_approx_eq!(sensor.smoothed()[2], 0.8 + 0.2 * 100.0 / 150.0);
    assert!(sensor.readings().iter().all(|r| (0.0..=1.0).contains(r)));
}

/// Test that the traffic population never exceeds its cap.
#[test]
fn traffic_never_exceeds_cap() {
    let mut sim = Simulation::new(&SimulationAttributes::default()).unwrap();
    add_player(&mut sim, 200.0, 500.0);
    let cap = sim.traffic().attributes().max_population;
    for _ in 0..2000 {
        sim.step(DT);
        assert!(sim.traffic().active().len() <= cap);
        assert!(sim.traffic().allocated() <= cap);
    }
    assert_eq!(sim.iter_traffic().count(), sim.traffic().active().len());
    assert!(sim.iter_traffic().all(|v| v.is_traffic() && v.is_autonomous()));
}

/// Slow, dense traffic that an autonomous reference vehicle cruises straight through.
fn slow_traffic() -> SimulationAttributes {
    SimulationAttributes {
        traffic: TrafficAttributes {
            classes: vec![ClassProfile::new(
                VehicleClass::Car,
                30.0,
                50.0,
                Interval::new(1.0, 1.0),
            )],
            rules: DecisionRules {
                lane_change_distance: 0.0,
                slowdown_distance: 0.0,
                brake_probability: 0.0,
                ..Default::default()
            },
            max_population: 3,
            density_probability: 1.0,
            seed: 7,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn cruiser() -> VehicleAttributes {
    VehicleAttributes {
        autonomous: true,
        cruise_speed: 5.0,
        sensor: None,
        ..Default::default()
    }
}

/// Test that traffic left behind is recycled and respawned from the pool.
#[test]
fn traffic_is_recycled_and_reused() {
    let mut sim = Simulation::new(&slow_traffic()).unwrap();
    let reference = sim
        .add_vehicle(&cruiser(), Point2d::new(200.0, 500.0))
        .unwrap();

    for _ in 0..5000 {
        sim.step(DT);
        assert!(sim.traffic().allocated() <= 3);
    }

    // The first vehicles spawned are long gone, so these are reused ones
    let anchor = sim.get_vehicle(reference).unwrap().position().y;
    assert!(anchor < -10_000.0);
    assert!(!sim.traffic().active().is_empty());
    for vehicle in sim.iter_traffic() {
        assert!(vehicle.position().y <= anchor + 600.0);
        assert!(vehicle.position().y >= anchor - 2000.0);
    }
    assert_eq!(
        sim.iter_vehicles().count(),
        sim.traffic().active().len() + 1
    );
}

/// Test that two simulations with the same seed evolve identically.
#[test]
fn seeded_runs_are_reproducible() {
    let run = || {
        let mut sim = Simulation::new(&slow_traffic()).unwrap();
        sim.add_vehicle(&cruiser(), Point2d::new(200.0, 500.0))
            .unwrap();
        for _ in 0..1500 {
            sim.step(DT);
        }
        sim.iter_traffic()
            .map(|v| (v.position(), v.speed(), v.class()))
            .collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}

/// Test that autonomous vehicles only collide when traffic collisions are enabled.
#[test]
fn autonomous_collisions_follow_configuration() {
    for traffic_collisions in [false, true] {
        let mut sim = Simulation::new(&SimulationAttributes {
            traffic_collisions,
            ..empty_road()
        })
        .unwrap();
        let id = sim
            .add_vehicle(&cruiser(), Point2d::new(200.0, 500.0))
            .unwrap();
        sim.add_obstacle(Obstacle::centred(Point2d::new(200.0, 490.0), 40.0, 40.0));
        sim.step(DT);
        assert_eq!(sim.get_vehicle(id).unwrap().is_collided(), traffic_collisions);
    }
}

/// Test that a manually driven vehicle collides even with traffic collisions disabled.
#[test]
fn manual_vehicles_always_collide() {
    let mut sim = Simulation::new(&empty_road()).unwrap();
    let id = add_player(&mut sim, 200.0, 500.0);
    sim.add_obstacle(Obstacle::centred(Point2d::new(200.0, 490.0), 40.0, 40.0));
    sim.step(DT);
    assert!(sim.get_vehicle(id).unwrap().is_collided());
}

/// Test that a removed obstacle no longer causes collisions.
#[test]
fn removed_obstacle_is_harmless() {
    let mut sim = Simulation::new(&empty_road()).unwrap();
    let id = add_player(&mut sim, 200.0, 500.0);
    let obstacle = sim.add_obstacle(Obstacle::centred(Point2d::new(200.0, 490.0), 40.0, 40.0));
    assert!(sim.remove_obstacle(obstacle).is_some());
    assert_eq!(sim.iter_obstacles().count(), 0);
    sim.step(DT);
    assert!(!sim.get_vehicle(id).unwrap().is_collided());
}

fn offloaded() -> SimulationAttributes {
    SimulationAttributes {
        collision_mode: CollisionMode::Offloaded,
        ..empty_road()
    }
}

/// Test that offloaded collision checks take effect once synchronised.
#[test]
fn offloaded_collisions_apply_after_sync() {
    let mut sim = Simulation::new(&offloaded()).unwrap();
    let player = add_player(&mut sim, 200.0, 500.0);
    sim.add_obstacle(Obstacle::centred(Point2d::new(200.0, 400.0), 40.0, 40.0));
    sim.set_controls(player, forward());

    for _ in 0..100 {
        sim.step(DT);
        assert!(sim.sync_collisions(Duration::from_secs(5)));
        if sim.get_vehicle(player).unwrap().is_collided() {
            break;
        }
    }
    let vehicle = sim.get_vehicle(player).unwrap();
    assert!(vehicle.is_collided());
    assert_eq!(vehicle.collision_point(), Some(vehicle.position()));
}

/// Test that resetting a vehicle discards its in-flight collision result.
#[test]
fn reset_discards_pending_collision() {
    let mut sim = Simulation::new(&offloaded()).unwrap();
    let player = add_player(&mut sim, 200.0, 500.0);
    sim.add_obstacle(Obstacle::centred(Point2d::new(200.0, 490.0), 40.0, 40.0));

    // The check is in flight, not yet applied
    sim.step(DT);
    assert!(!sim.get_vehicle(player).unwrap().is_collided());

    // Resetting makes the in-flight result stale
    sim.reset_vehicle(player);
    assert!(sim.sync_collisions(Duration::from_secs(5)));
    assert!(!sim.get_vehicle(player).unwrap().is_collided());

    // A fresh check still applies
    sim.step(DT);
    assert!(sim.sync_collisions(Duration::from_secs(5)));
    assert!(sim.get_vehicle(player).unwrap().is_collided());
}

/// Test that invalid road and vehicle configurations are rejected.
#[test]
fn invalid_configuration_is_rejected() {
    let attributes = SimulationAttributes {
        road: lane_sim::RoadAttributes {
            lane_count: 0,
            ..Default::default()
        },
        ..Default::default()
    };
    assert_eq!(
        Simulation::new(&attributes).err(),
        Some(lane_sim::ConfigError::LaneCount(0))
    );

    let mut sim = Simulation::new(&empty_road()).unwrap();
    let bad = VehicleAttributes {
        width: 0.0,
        ..Default::default()
    };
    assert!(sim.add_vehicle(&bad, Point2d::new(200.0, 500.0)).is_err());
    assert_eq!(sim.iter_vehicles().count(), 0);
}

/// Test that the sensor detects a traffic vehicle directly ahead of the player.
#[test]
fn sensor_sees_traffic_ahead() {
    let attributes = SimulationAttributes {
        road: lane_sim::RoadAttributes {
            lane_count: 1,
            ..Default::default()
        },
        traffic: TrafficAttributes {
            classes: vec![ClassProfile::new(
                VehicleClass::Car,
                30.0,
                50.0,
                Interval::new(1.0, 1.0),
            )],
            rules: DecisionRules {
                brake_probability: 0.0,
                ..Default::default()
            },
            initial_count: 1,
            max_population: 1,
            density_probability: 0.0,
            spawn_distance: Interval::new(100.0, 100.0),
            ..Default::default()
        },
        ..Default::default()
    };
    let mut sim = Simulation::new(&attributes).unwrap();
    let player = add_player(&mut sim, 200.0, 500.0);
    sim.step(DT);

    // Spawned at y = 400, then moved up one unit; its rear edge is at 424
    let ahead = sim.iter_traffic().next().unwrap();
    assert_approx_eq!(ahead.position().x, 200.0);
    assert_approx_eq!(ahead.position().y, 399.0);

    let sensor = sim.sensor(player).unwrap();
    assert!(sensor.readings()[2] < 1.0);
    assert_approx_eq!(sensor.readings()[2], (500.0 - 424.0) / 150.0);
    assert_approx_eq!(sensor.hits()[2].unwrap().y, 424.0);
    assert!(!sim.get_vehicle(player).unwrap().is_collided());
}

/// Test that physical parameters which would break the speed limits are rejected.
#[test]
fn speed_breaking_vehicles_are_rejected() {
    let mut sim = Simulation::new(&empty_road()).unwrap();
    let too_bouncy = VehicleAttributes {
        boundary_penalty: 1.5,
        ..Default::default()
    };
    let negative_friction = VehicleAttributes {
        friction: -0.1,
        ..Default::default()
    };
    for attributes in [too_bouncy, negative_friction] {
        assert!(matches!(
            sim.add_vehicle(&attributes, Point2d::new(200.0, 500.0)),
            Err(lane_sim::ConfigError::Vehicle { .. })
        ));
    }
    assert_eq!(sim.iter_vehicles().count(), 0);
}

/// Test that traffic with an unbounded spawn distance is rejected up front.
#[test]
fn unbounded_spawn_distance_is_rejected() {
    let attributes = SimulationAttributes {
        traffic: TrafficAttributes {
            spawn_distance: Interval::new(200.0, f64::INFINITY),
            ..Default::default()
        },
        ..Default::default()
    };
    assert!(matches!(
        Simulation::new(&attributes),
        Err(lane_sim::ConfigError::Traffic { name: "spawn_distance", .. })
    ));
}
