//! Control module for the Prometheus trajectory service
pub mod trajectory;

pub use self::trajectory::{sample_trajectory, TrajectorySampler};
