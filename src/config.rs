//! Service configuration
//!
//! Loaded from YAML; every field has a default so a partial file (or none at all)
//! is valid. See `config/trajectory_server.yaml` for the shipped values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::navigation::planner::MotionLimits;

/// How the byte stream is split into request documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    /// One transport read is one document
    Chunk,
    /// Newline-delimited documents
    Lines,
}

/// What to do with a request that does not decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// Send an error body and keep the session open
    Respond,
    /// Drop the connection
    Close,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub framing: Framing,
    /// Size of a single transport read in chunk framing
    pub read_buffer_size: usize,
    /// Longest accepted line in line framing
    pub max_frame_len: usize,
    /// Close sessions that stay silent this long
    pub idle_timeout_secs: Option<u64>,
    /// Stop after this many sessions; unset serves until shutdown
    pub max_sessions: Option<usize>,
    pub malformed_requests: MalformedPolicy,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 65426,
            framing: Framing::Chunk,
            read_buffer_size: 2048,
            max_frame_len: 64 * 1024,
            idle_timeout_secs: None,
            max_sessions: None,
            malformed_requests: MalformedPolicy::Respond,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Arc-length table spacing (m)
    pub path_resolution: f64,
    /// Number of time steps per trajectory
    pub sample_count: usize,
    /// Active profile name
    pub profile: String,
    pub profiles: BTreeMap<String, MotionLimits>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert("cruise".to_string(), MotionLimits::new(5.0, 1.0));
        profiles.insert("preview".to_string(), MotionLimits::new(1.0, 0.5));

        PlannerConfig {
            path_resolution: 0.01,
            sample_count: 100,
            profile: "cruise".to_string(),
            profiles,
        }
    }
}

/// Top-level configuration for the trajectory service
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub planner: PlannerConfig,
}

impl ServiceConfig {
    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Limits of the active profile
    pub fn active_limits(&self) -> Result<MotionLimits, ConfigError> {
        self.planner
            .profiles
            .get(&self.planner.profile)
            .copied()
            .ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "unknown profile '{}' (available: {})",
                    self.planner.profile,
                    self.planner.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
                ))
            })
    }

    /// Check cross-field consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.is_empty() {
            return Err(ConfigError::Invalid("server.host must not be empty".to_string()));
        }
        if self.server.read_buffer_size == 0 {
            return Err(ConfigError::Invalid(
                "server.read_buffer_size must be positive".to_string(),
            ));
        }
        if self.server.max_frame_len == 0 {
            return Err(ConfigError::Invalid(
                "server.max_frame_len must be positive".to_string(),
            ));
        }
        if self.server.max_sessions == Some(0) {
            return Err(ConfigError::Invalid(
                "server.max_sessions must be positive when set".to_string(),
            ));
        }
        if !(self.planner.path_resolution.is_finite() && self.planner.path_resolution > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "planner.path_resolution must be positive, got {}",
                self.planner.path_resolution
            )));
        }
        for (name, limits) in &self.planner.profiles {
            if !limits.max_velocity.is_finite()
                || !limits.max_acceleration.is_finite()
                || limits.max_velocity < 0.0
                || limits.max_acceleration < 0.0
            {
                return Err(ConfigError::Invalid(format!(
                    "profile '{}' has invalid limits {:?}",
                    name, limits
                )));
            }
        }
        self.active_limits()?;
        Ok(())
    }
}
