//! Navigation module for the Prometheus trajectory service
pub mod motion_profile;
pub mod path_planning;
pub mod planner;

pub use self::motion_profile::TrapezoidalProfile;
pub use self::path_planning::{SplineTrajectory, SplineTrajectoryPlanner};
pub use self::planner::{ContinuousTrajectory, MotionLimits, TrajectoryPlanner};
