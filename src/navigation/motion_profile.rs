//! Trapezoidal velocity profile along a path
//!
//! Accelerates at the limit, cruises at the velocity limit, then decelerates to
//! rest. When the path is too short to reach the cruise velocity the profile
//! degrades to a triangle.

use crate::error::PlannerError;
use crate::navigation::planner::MotionLimits;

#[derive(Debug, Clone, Copy)]
pub struct TrapezoidalProfile {
    distance: f64,
    acceleration: f64,
    peak_velocity: f64,
    accel_time: f64,
    cruise_time: f64,
}

impl TrapezoidalProfile {
    /// Build a rest-to-rest profile covering `distance` meters
    pub fn new(distance: f64, limits: MotionLimits) -> Result<Self, PlannerError> {
        if !limits.is_drivable() {
            return Err(PlannerError::InvalidLimits {
                max_velocity: limits.max_velocity,
                max_acceleration: limits.max_acceleration,
            });
        }
        if !distance.is_finite() || distance <= 0.0 {
            return Err(PlannerError::DegenerateInput(format!(
                "path length must be positive, got {}",
                distance
            )));
        }

        let a = limits.max_acceleration;
        let accel_distance = limits.max_velocity.powi(2) / (2.0 * a);

        let (peak_velocity, cruise_time) = if 2.0 * accel_distance >= distance {
            // Triangle: never reaches the velocity limit
            ((a * distance).sqrt(), 0.0)
        } else {
            let cruise_distance = distance - 2.0 * accel_distance;
            (limits.max_velocity, cruise_distance / limits.max_velocity)
        };

        Ok(TrapezoidalProfile {
            distance,
            acceleration: a,
            peak_velocity,
            accel_time: peak_velocity / a,
            cruise_time,
        })
    }

    pub fn total_time(&self) -> f64 {
        2.0 * self.accel_time + self.cruise_time
    }

    pub fn peak_velocity(&self) -> f64 {
        self.peak_velocity
    }

    /// Distance travelled at time `t`, clamped to `[0, distance]`
    pub fn distance_at(&self, t: f64) -> f64 {
        if t <= 0.0 {
            return 0.0;
        }
        if t >= self.total_time() {
            return self.distance;
        }

        let a = self.acceleration;
        let ta = self.accel_time;
        let decel_start = ta + self.cruise_time;

        let d = if t < ta {
            0.5 * a * t * t
        } else if t < decel_start {
            0.5 * a * ta * ta + self.peak_velocity * (t - ta)
        } else {
            let remaining = self.total_time() - t;
            self.distance - 0.5 * a * remaining * remaining
        };
        d.clamp(0.0, self.distance)
    }
}
