//! Construction-time configuration errors.

use thiserror::Error;

/// Result type alias for fallible constructors.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// A configuration which cannot produce a valid object.
///
/// These are only raised when a road, vehicle, sensor or traffic controller
/// is constructed. Nothing in the per-tick simulation returns an error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// The road width is not a positive, finite number.
    #[error("road width must be positive, got {0}")]
    RoadWidth(f64),

    /// The road has no lanes.
    #[error("road must have at least one lane, got {0}")]
    LaneCount(usize),

    /// A sensor has no rays.
    #[error("sensor must have at least one ray, got {0}")]
    RayCount(usize),

    /// A sensor's ray length is not a positive, finite number.
    #[error("sensor ray length must be positive, got {0}")]
    RayLength(f64),

    /// A sensor's smoothing factor is outside `(0, 1]`.
    #[error("sensor smoothing factor must be in (0, 1], got {0}")]
    SmoothingFactor(f64),

    /// A vehicle footprint has a non-positive dimension.
    #[error("vehicle footprint must be positive, got {width} x {height}")]
    Footprint {
        /// The requested width.
        width: f64,
        /// The requested height.
        height: f64,
    },

    /// A vehicle's speed limits don't bracket zero.
    #[error("speed limits must satisfy max_reverse_speed <= 0 < max_speed, got [{min}, {max}]")]
    SpeedLimits {
        /// The maximum reverse speed.
        min: f64,
        /// The maximum forward speed.
        max: f64,
    },

    /// A vehicle's physical parameter is out of range.
    #[error("invalid vehicle parameter `{name}`: {reason}")]
    Vehicle {
        /// The name of the offending parameter.
        name: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// A traffic parameter is out of range.
    #[error("invalid traffic parameter `{name}`: {reason}")]
    Traffic {
        /// The name of the offending parameter.
        name: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}
