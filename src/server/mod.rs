//! TCP front end for the trajectory sampler
//!
//! Connections are served one at a time: the next client is accepted only after
//! the current session has closed.

pub mod codec;
pub mod session;

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::control::trajectory::TrajectorySampler;
use crate::error::ServerError;
use crate::navigation::planner::TrajectoryPlanner;

use self::session::{Session, SessionOptions, SessionStats};

const ACCEPT_BACKOFF_MIN: Duration = Duration::from_millis(10);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Delay before retrying after `failures` consecutive accept errors
fn accept_backoff(failures: u32) -> Duration {
    let factor = 1u32 << failures.saturating_sub(1).min(16);
    ACCEPT_BACKOFF_MIN.saturating_mul(factor).min(ACCEPT_BACKOFF_MAX)
}

/// Why the listener stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `max_sessions` sessions have been served
    SessionLimit,
    /// The shutdown future resolved
    Shutdown,
}

/// Totals over the listener's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServeSummary {
    pub sessions: usize,
    pub failed_sessions: usize,
    pub requests: usize,
    pub stop_reason: StopReason,
}

/// The trajectory service listener
///
/// Owns the listening socket; it is closed when the server is dropped, which
/// happens on every return path of [`TrajectoryServer::serve_with_shutdown`].
pub struct TrajectoryServer<P> {
    listener: TcpListener,
    sampler: TrajectorySampler<P>,
    options: SessionOptions,
    max_sessions: Option<usize>,
}

impl<P: TrajectoryPlanner> TrajectoryServer<P> {
    /// Bind the configured address
    pub async fn bind(config: &ServerConfig, sampler: TrajectorySampler<P>) -> Result<Self, ServerError> {
        let addr = config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        Ok(TrajectoryServer {
            listener,
            sampler,
            options: SessionOptions::from(config),
            max_sessions: config.max_sessions,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until `max_sessions` is reached
    pub async fn serve(self) -> Result<ServeSummary, ServerError> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Serve until `max_sessions` is reached or `shutdown` resolves
    ///
    /// Shutdown is honoured while waiting for a client and in the middle of a
    /// session; an interrupted session is dropped without a reply.
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<ServeSummary, ServerError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut summary = ServeSummary {
            sessions: 0,
            failed_sessions: 0,
            requests: 0,
            stop_reason: StopReason::Shutdown,
        };

        let mut accept_failures = 0u32;

        loop {
            if let Some(limit) = self.max_sessions {
                if summary.sessions >= limit {
                    summary.stop_reason = StopReason::SessionLimit;
                    break;
                }
            }

            let (stream, peer) = tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok(conn) => {
                        accept_failures = 0;
                        conn
                    }
                    Err(e) => {
                        accept_failures = accept_failures.saturating_add(1);
                        let delay = accept_backoff(accept_failures);
                        error!(error = %e, failures = accept_failures, retry_in = ?delay, "failed to accept connection");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                },
                _ = &mut shutdown => {
                    info!("shutdown requested, no longer accepting connections");
                    break;
                }
            };

            if let Err(e) = stream.set_nodelay(true) {
                warn!(peer = %peer, error = %e, "failed to set TCP_NODELAY");
            }

            let session = Session::new(stream, peer, &self.sampler, self.options);
            summary.sessions += 1;

            let outcome = tokio::select! {
                outcome = session.run() => outcome,
                _ = &mut shutdown => {
                    info!(peer = %peer, "shutdown requested, dropping active session");
                    break;
                }
            };

            match outcome {
                Ok(SessionStats { requests, .. }) => summary.requests += requests,
                Err(source) => {
                    summary.failed_sessions += 1;
                    let e = ServerError::Session { peer, source };
                    warn!(error = %e, "session failed");
                }
            }
        }

        info!(
            sessions = summary.sessions,
            failed = summary.failed_sessions,
            requests = summary.requests,
            "trajectory server stopped"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_backoff_doubles_up_to_the_cap() {
        assert_eq!(accept_backoff(1), Duration::from_millis(10));
        assert_eq!(accept_backoff(2), Duration::from_millis(20));
        assert_eq!(accept_backoff(4), Duration::from_millis(80));
        assert_eq!(accept_backoff(8), ACCEPT_BACKOFF_MAX);
        assert_eq!(accept_backoff(u32::MAX), ACCEPT_BACKOFF_MAX);
    }
}
