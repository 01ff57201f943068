use super::Controls;
use crate::util::Interval;

/// Simplified kinematic model of a vehicle's speed and heading.
///
/// All rates are expressed per simulation tick.
#[derive(Clone, Debug)]
pub struct Dynamics {
    acceleration: f64,
    speed_limits: Interval<f64>,
    friction: f64,
    braking_power: f64,
    turning_rate: f64,
    grip: f64,
    slip: f64,
    min_turn_speed: f64,
}

/// The parameters of the kinematic model.
pub struct ModelParams {
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
    /// Surface grip in `[0, 1]`; less grip means sharper turns.
    pub grip: f64,
    /// Extra turning per tick at zero grip, in radians.
    pub slip: f64,
    /// The vehicle doesn't turn at or below this speed.
    pub min_turn_speed: f64,
}

impl Dynamics {
    /// Creates a new kinematic model.
    pub fn new(params: &ModelParams) -> Self {
        Self {
            acceleration: params.acceleration,
            speed_limits: Interval::new(params.max_reverse_speed, params.max_speed),
            friction: params.friction,
            braking_power: params.braking_power,
            turning_rate: params.turning_rate,
            grip: params.grip,
            slip: params.slip,
            min_turn_speed: params.min_turn_speed,
        }
    }

    /// The permitted range of speeds, from maximum reverse to maximum forward.
    pub fn speed_limits(&self) -> Interval<f64> {
        self.speed_limits
    }

    /// Applies throttle, brake, the speed limits and, if `coast` is set, friction.
    pub fn update_speed(&self, mut speed: f64, controls: &Controls, coast: bool) -> f64 {
        if controls.forward {
            speed += self.acceleration;
        }
        if controls.brake {
            if speed > 0.0 {
                speed = f64::max(speed - self.braking_power, 0.0);
            } else {
                speed -= self.acceleration;
            }
        }
        speed = self.speed_limits.clamp(speed);

        if coast && !controls.forward && !controls.brake {
            speed = self.apply_friction(speed);
        }
        speed
    }

    /// Decays the speed towards zero, snapping to zero once it drops below the friction.
    fn apply_friction(&self, mut speed: f64) -> f64 {
        if speed > 0.0 {
            speed -= self.friction;
        } else if speed < 0.0 {
            speed += self.friction;
        }
        if speed.abs() < self.friction {
            speed = 0.0;
        }
        speed
    }

    /// The heading change per tick at full speed, accounting for surface grip.
    pub fn turn_rate(&self) -> f64 {
        self.turning_rate + self.slip * (1.0 - self.grip)
    }

    /// Computes the new heading given the current speed and steering input.
    ///
    /// Turning scales with the fraction of top speed, so it is negligible near
    /// standstill and reverses direction when reversing.
    pub fn update_heading(&self, angle: f64, speed: f64, controls: &Controls) -> f64 {
        if speed.abs() <= self.min_turn_speed {
            return angle;
        }
        let speed_frac = speed / self.speed_limits.max;
        angle + controls.steering() * self.turn_rate() * speed_frac
    }
}
