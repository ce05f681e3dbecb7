//! Planner contract
//!
//! A planner turns a start pose, waypoints and an end pose into a continuous,
//! time-indexed trajectory. The sampler only ever talks to these traits.

use serde::{Deserialize, Serialize};

use crate::common::{Pose, Position};
use crate::error::PlannerError;

/// Velocity and acceleration bounds for one deployment profile
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionLimits {
    /// Maximum linear velocity (m/s)
    pub max_velocity: f64,
    /// Maximum linear acceleration (m/s^2)
    pub max_acceleration: f64,
}

impl MotionLimits {
    pub fn new(max_velocity: f64, max_acceleration: f64) -> Self {
        MotionLimits {
            max_velocity,
            max_acceleration,
        }
    }

    /// Both limits finite and strictly positive
    pub fn is_drivable(&self) -> bool {
        self.max_velocity.is_finite()
            && self.max_acceleration.is_finite()
            && self.max_velocity > 0.0
            && self.max_acceleration > 0.0
    }
}

/// A trajectory covering `[0, total_time]`
#[cfg_attr(test, mockall::automock)]
pub trait ContinuousTrajectory {
    /// Duration of the trajectory in seconds
    fn total_time(&self) -> f64;

    /// Pose at elapsed time `t`
    fn sample(&self, t: f64) -> Pose;
}

/// Trait for trajectory planning algorithms
#[cfg_attr(test, mockall::automock)]
pub trait TrajectoryPlanner: Send + Sync {
    /// Build a continuous trajectory through `waypoints` bounded by `limits`
    fn generate(
        &self,
        start: &Pose,
        waypoints: &[Position],
        end: &Pose,
        limits: MotionLimits,
    ) -> Result<Box<dyn ContinuousTrajectory>, PlannerError>;
}

impl<P: TrajectoryPlanner + ?Sized> TrajectoryPlanner for Box<P> {
    fn generate(
        &self,
        start: &Pose,
        waypoints: &[Position],
        end: &Pose,
        limits: MotionLimits,
    ) -> Result<Box<dyn ContinuousTrajectory>, PlannerError> {
        (**self).generate(start, waypoints, end, limits)
    }
}
