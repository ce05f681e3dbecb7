use anyhow::{Context, Result};
use clap::Parser;
use prometheus_trajectory::{sampler_from_config, ServiceConfig, TrajectoryServer};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Trajectory sampling service for the Prometheus robot
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// YAML configuration file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Motion profile to plan with, e.g. `cruise` or `preview`
    #[arg(short, long)]
    profile: Option<String>,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// Exit after serving this many sessions
    #[arg(long)]
    max_sessions: Option<usize>,
}

impl Args {
    fn load_config(&self) -> Result<ServiceConfig> {
        let mut config = match &self.config {
            Some(path) => ServiceConfig::load(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => ServiceConfig::default(),
        };

        if let Some(profile) = &self.profile {
            config.planner.profile = profile.clone();
        }
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(max_sessions) = self.max_sessions {
            config.server.max_sessions = Some(max_sessions);
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = args.load_config()?;

    let sampler = sampler_from_config(&config)?;
    info!(
        profile = %config.planner.profile,
        max_velocity = sampler.limits().max_velocity,
        max_acceleration = sampler.limits().max_acceleration,
        sample_count = sampler.sample_count(),
        framing = ?config.server.framing,
        "initializing trajectory server"
    );

    let server = TrajectoryServer::bind(&config.server, sampler)
        .await
        .context("failed to start trajectory server")?;
    info!(addr = %server.local_addr()?, "listening for trajectory requests");

    let summary = server
        .serve_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    info!(
        sessions = summary.sessions,
        requests = summary.requests,
        reason = ?summary.stop_reason,
        "trajectory server exited"
    );
    Ok(())
}
