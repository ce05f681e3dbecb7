//! Trajectory sampling module
//!
//! Forwards a request to the planner and discretizes the continuous result into
//! field positions. Planner failures are returned to the caller untouched.

use crate::common::{SampledTrajectory, TrajectoryRequest};
use crate::error::PlannerError;
use crate::navigation::planner::{ContinuousTrajectory, MotionLimits, TrajectoryPlanner};
use tracing::debug;

/// Sample `request` through `planner` into `sample_count` time steps
///
/// Samples are taken at `t = i * step` with `step = T / sample_count` for every
/// `t <= T`, so a successful call yields `sample_count + 1` positions including
/// both endpoints.
pub fn sample_trajectory<P: TrajectoryPlanner + ?Sized>(
    planner: &P,
    request: &TrajectoryRequest,
    sample_count: usize,
    limits: MotionLimits,
) -> Result<SampledTrajectory, PlannerError> {
    let trajectory = planner.generate(&request.start, &request.points, &request.end, limits)?;
    let total_time = trajectory.total_time();

    if !total_time.is_finite() {
        return Err(PlannerError::NonFiniteDuration(total_time));
    }
    if total_time <= 0.0 {
        return Err(PlannerError::ZeroDuration);
    }
    if sample_count == 0 {
        return Ok(SampledTrajectory::empty());
    }

    let samples = discretize(trajectory.as_ref(), total_time, sample_count);
    debug!(
        total_time,
        samples = samples.len(),
        waypoints = request.points.len(),
        "sampled trajectory"
    );
    Ok(samples)
}

fn discretize(
    trajectory: &dyn ContinuousTrajectory,
    total_time: f64,
    sample_count: usize,
) -> SampledTrajectory {
    let step = total_time / sample_count as f64;
    // floor(T / step) is exactly sample_count; evaluating the quotient in floating
    // point can land one below it and drop the sample at t == T
    (0..=sample_count)
        .map(|i| {
            let t = if i == sample_count {
                total_time
            } else {
                (i as f64 * step).min(total_time)
            };
            trajectory.sample(t).translation
        })
        .collect()
}

/// Planner adapter bound to one deployment profile
#[derive(Debug, Clone)]
pub struct TrajectorySampler<P> {
    planner: P,
    sample_count: usize,
    limits: MotionLimits,
}

impl<P: TrajectoryPlanner> TrajectorySampler<P> {
    /// Create a sampler for the given planner and profile
    pub fn new(planner: P, sample_count: usize, limits: MotionLimits) -> Self {
        TrajectorySampler {
            planner,
            sample_count,
            limits,
        }
    }

    /// Sample a request with this sampler's profile
    pub fn sample(&self, request: &TrajectoryRequest) -> Result<SampledTrajectory, PlannerError> {
        sample_trajectory(&self.planner, request, self.sample_count, self.limits)
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    pub fn limits(&self) -> MotionLimits {
        self.limits
    }
}
