//! Error types for the trajectory service

use std::net::SocketAddr;
use thiserror::Error;

/// The planner could not produce a usable trajectory
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("invalid motion limits: max_velocity={max_velocity}, max_acceleration={max_acceleration}")]
    InvalidLimits {
        max_velocity: f64,
        max_acceleration: f64,
    },

    #[error("degenerate input: {0}")]
    DegenerateInput(String),

    #[error("cubic spline fit failed for {knots} knots")]
    SplineFit { knots: usize },

    #[error("trajectory duration is not finite: {0}")]
    NonFiniteDuration(f64),

    #[error("trajectory has zero duration")]
    ZeroDuration,

    #[error("planner failure: {0}")]
    Internal(String),
}

/// Failures on the request/response path of a session
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed request: {0}")]
    MalformedRequest(#[source] serde_json::Error),

    #[error("malformed response: {0}")]
    MalformedResponse(#[source] serde_json::Error),

    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("frame exceeds {limit} bytes")]
    FrameTooLarge { limit: usize },

    #[error("server rejected request: {0}")]
    Rejected(String),

    #[error("connection closed before a complete response arrived")]
    UnexpectedEof,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Configuration could not be loaded or is inconsistent
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Listener level failures
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("session with {peer} failed: {source}")]
    Session {
        peer: SocketAddr,
        #[source]
        source: ProtocolError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
