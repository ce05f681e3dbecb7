pub mod client;
pub mod common;
pub mod config;
pub mod control;
pub mod error;
pub mod navigation;
pub mod server;

pub use crate::client::{TrajectoryClient, TrajectoryReply};
pub use crate::common::{Pose, Position, SampledTrajectory, TrajectoryRequest};
pub use crate::config::ServiceConfig;
pub use crate::control::{sample_trajectory, TrajectorySampler};
pub use crate::error::{ConfigError, PlannerError, ProtocolError, ServerError};
pub use crate::navigation::{MotionLimits, SplineTrajectoryPlanner, TrajectoryPlanner};
pub use crate::server::TrajectoryServer;

/// Sampler for the active profile of `config`, backed by the spline planner
pub fn sampler_from_config(
    config: &ServiceConfig,
) -> Result<TrajectorySampler<SplineTrajectoryPlanner>, ConfigError> {
    let limits = config.active_limits()?;
    let planner = SplineTrajectoryPlanner::new(config.planner.path_resolution);
    Ok(TrajectorySampler::new(
        planner,
        config.planner.sample_count,
        limits,
    ))
}
