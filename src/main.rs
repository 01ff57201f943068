use std::time::Instant;

use lane_sim::cgmath::Point2;
use lane_sim::{Controls, Simulation, SimulationAttributes, VehicleAttributes};

fn main() {
    let mut sim = Simulation::new(&SimulationAttributes::default()).unwrap();
    let player = sim
        .add_vehicle(&VehicleAttributes::default(), Point2::new(200.0, 500.0))
        .unwrap();
    sim.set_controls(
        player,
        Controls {
            forward: true,
            ..Default::default()
        },
    );

    println!("Simulating...");
    let num_frames = 10_000;
    loop {
        let start = Instant::now();
        for _ in 0..num_frames {
            sim.step(1.0 / 60.0);
        }
        let frame = start.elapsed() / num_frames;
        println!(
            "Avg. frame: {:?} --> {:.0}x real time ({} vehs, {} pooled)",
            frame,
            (1.0 / 60.0) / frame.as_secs_f64(),
            sim.iter_vehicles().count(),
            sim.traffic().pool_len(),
        );
        if sim.get_vehicle(player).map_or(true, |v| v.is_collided()) {
            sim.reset_vehicle(player);
        }
    }
}
