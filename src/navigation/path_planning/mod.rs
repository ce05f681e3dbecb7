use crate::common::{Pose, Position};
use crate::error::PlannerError;
use crate::navigation::motion_profile::TrapezoidalProfile;
use crate::navigation::planner::{ContinuousTrajectory, MotionLimits, TrajectoryPlanner};
use nalgebra::Vector2;
use std::f64::consts::PI;
use tracing::debug;

pub mod cubic_spline_planner;

use self::cubic_spline_planner::CubicSpline2D;

/// Points closer than this are treated as the same control point
const COINCIDENT_EPSILON: f64 = 1e-9;

/// Upper bound on arc-length table entries; longer paths get a coarser spacing
const MAX_ARC_STEPS: usize = 100_000;

/// Spline planner with a trapezoidal timing law
///
/// The path is a natural cubic spline through start, waypoints and end. Time is
/// assigned by a rest-to-rest trapezoidal profile along the path's arc length,
/// and the heading is blended from the start rotation to the end rotation.
#[derive(Debug, Clone)]
pub struct SplineTrajectoryPlanner {
    resolution: f64, // Arc-length table spacing (m)
}

impl SplineTrajectoryPlanner {
    pub fn new(resolution: f64) -> Self {
        SplineTrajectoryPlanner { resolution }
    }

    /// Control points in path order with consecutive duplicates collapsed
    fn control_points(start: &Pose, waypoints: &[Position], end: &Pose) -> Vec<Vector2<f64>> {
        let mut points: Vec<Position> = Vec::with_capacity(waypoints.len() + 2);
        let all = std::iter::once(start.translation)
            .chain(waypoints.iter().copied())
            .chain(std::iter::once(end.translation));

        for p in all {
            match points.last() {
                Some(last) if p.distance_to(last) < COINCIDENT_EPSILON => {}
                _ => points.push(p),
            }
        }
        points.iter().map(Position::to_vector).collect()
    }
}

impl Default for SplineTrajectoryPlanner {
    fn default() -> Self {
        SplineTrajectoryPlanner::new(0.01)
    }
}

impl TrajectoryPlanner for SplineTrajectoryPlanner {
    fn generate(
        &self,
        start: &Pose,
        waypoints: &[Position],
        end: &Pose,
        limits: MotionLimits,
    ) -> Result<Box<dyn ContinuousTrajectory>, PlannerError> {
        if !limits.is_drivable() {
            return Err(PlannerError::InvalidLimits {
                max_velocity: limits.max_velocity,
                max_acceleration: limits.max_acceleration,
            });
        }
        if !(self.resolution.is_finite() && self.resolution > 0.0) {
            return Err(PlannerError::Internal(format!(
                "path resolution must be positive, got {}",
                self.resolution
            )));
        }

        let points = Self::control_points(start, waypoints, end);
        if points.iter().any(|p| !(p.x.is_finite() && p.y.is_finite())) {
            return Err(PlannerError::DegenerateInput(
                "control points must be finite".to_string(),
            ));
        }
        if points.len() < 2 {
            return Err(PlannerError::DegenerateInput(
                "start and end coincide with no distinct waypoints".to_string(),
            ));
        }

        let spline = CubicSpline2D::new(&points).ok_or(PlannerError::SplineFit {
            knots: points.len(),
        })?;
        let total = spline.parameter_length();
        if !total.is_finite() {
            return Err(PlannerError::DegenerateInput(format!(
                "path length is not finite: {}",
                total
            )));
        }
        let arc = ArcLengthTable::new(&spline, self.resolution);
        let profile = TrapezoidalProfile::new(arc.length(), limits)?;

        debug!(
            knots = points.len(),
            length = arc.length(),
            duration = profile.total_time(),
            peak_velocity = profile.peak_velocity(),
            "generated spline trajectory"
        );

        Ok(Box::new(SplineTrajectory {
            spline,
            arc,
            profile,
            start_rotation: start.rotation,
            rotation_delta: shortest_rotation(start.rotation, end.rotation),
        }))
    }
}

/// Signed rotation from `from` to `to`, normalized to [-pi, pi]
fn shortest_rotation(from: f64, to: f64) -> f64 {
    let diff = (to - from) % (2.0 * PI);
    if diff > PI {
        diff - 2.0 * PI
    } else if diff < -PI {
        diff + 2.0 * PI
    } else {
        diff
    }
}

/// Cumulative arc length against spline parameter
#[derive(Debug, Clone)]
struct ArcLengthTable {
    params: Vec<f64>,
    lengths: Vec<f64>,
}

impl ArcLengthTable {
    fn new(spline: &CubicSpline2D, resolution: f64) -> Self {
        let total = spline.parameter_length();
        // Float to usize casts saturate, so the min bounds any path length
        let steps = ((total / resolution).ceil() as usize).clamp(1, MAX_ARC_STEPS);

        let mut params = Vec::with_capacity(steps + 1);
        let mut lengths = Vec::with_capacity(steps + 1);
        let mut prev = spline.calc_position(0.0);
        let mut acc = 0.0;
        params.push(0.0);
        lengths.push(0.0);

        for i in 1..=steps {
            let s = (i as f64 * total / steps as f64).min(total);
            let p = spline.calc_position(s);
            acc += (p - prev).norm();
            params.push(s);
            lengths.push(acc);
            prev = p;
        }

        ArcLengthTable { params, lengths }
    }

    fn length(&self) -> f64 {
        self.lengths[self.lengths.len() - 1]
    }

    /// Spline parameter at arc length `d`
    fn param_at(&self, d: f64) -> f64 {
        let last = self.lengths.len() - 1;
        if d <= 0.0 {
            return 0.0;
        }
        if d >= self.lengths[last] {
            return self.params[last];
        }

        let hi = self.lengths.partition_point(|&l| l < d).clamp(1, last);
        let lo = hi - 1;
        let span = self.lengths[hi] - self.lengths[lo];
        if span <= 0.0 {
            return self.params[lo];
        }
        let ratio = (d - self.lengths[lo]) / span;
        self.params[lo] + ratio * (self.params[hi] - self.params[lo])
    }
}

/// A spline path timed by a trapezoidal profile
#[derive(Debug, Clone)]
pub struct SplineTrajectory {
    spline: CubicSpline2D,
    arc: ArcLengthTable,
    profile: TrapezoidalProfile,
    start_rotation: f64,
    rotation_delta: f64,
}

impl ContinuousTrajectory for SplineTrajectory {
    fn total_time(&self) -> f64 {
        self.profile.total_time()
    }

    fn sample(&self, t: f64) -> Pose {
        let d = self.profile.distance_at(t);
        let position = self.spline.calc_position(self.arc.param_at(d));
        let fraction = d / self.arc.length();

        Pose {
            translation: Position::from(position),
            rotation: self.start_rotation + fraction * self.rotation_delta,
        }
    }
}
