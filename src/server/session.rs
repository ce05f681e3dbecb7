//! One client session: read, decode, sample, respond, repeat
//!
//! Requests on a session are strictly sequential; the response to one request is
//! fully written before the next is read. Planning failures never end a session,
//! they are answered with an empty trajectory.

use std::any::Any;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tracing::{debug, info, warn};

use crate::common::{ErrorResponse, SampledTrajectory, TrajectoryRequest};
use crate::config::{Framing, MalformedPolicy, ServerConfig};
use crate::control::trajectory::TrajectorySampler;
use crate::error::{PlannerError, ProtocolError};
use crate::navigation::planner::TrajectoryPlanner;
use crate::server::codec::{FrameReader, FrameWriter};

/// State of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingRequest,
    Decoding,
    Sampling,
    RespondingSuccess,
    RespondingEmpty,
    RespondingError,
    Closed,
}

/// Per-session options taken from the server configuration
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub framing: Framing,
    pub read_buffer_size: usize,
    pub max_frame_len: usize,
    pub idle_timeout: Option<Duration>,
    pub malformed_requests: MalformedPolicy,
}

impl From<&ServerConfig> for SessionOptions {
    fn from(config: &ServerConfig) -> Self {
        SessionOptions {
            framing: config.framing,
            read_buffer_size: config.read_buffer_size,
            max_frame_len: config.max_frame_len,
            idle_timeout: config.idle_timeout(),
            malformed_requests: config.malformed_requests,
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions::from(&ServerConfig::default())
    }
}

/// Counters reported when a session closes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub requests: usize,
    pub planned: usize,
    pub degraded: usize,
    pub malformed: usize,
}

/// Outcome of one request
enum Reply {
    Trajectory(SampledTrajectory),
    Malformed(ProtocolError),
}

/// One accepted connection served by a borrowed sampler
///
/// Owns both halves of the stream. [`Session::run`] serves requests until the peer
/// closes, the session idles out, or a protocol error ends it.
pub struct Session<'a, S, P> {
    peer: SocketAddr,
    reader: FrameReader<ReadHalf<S>>,
    writer: FrameWriter<WriteHalf<S>>,
    sampler: &'a TrajectorySampler<P>,
    options: SessionOptions,
    state: SessionState,
    stats: SessionStats,
}

impl<'a, S, P> Session<'a, S, P>
where
    S: AsyncRead + AsyncWrite,
    P: TrajectoryPlanner,
{
    pub fn new(
        stream: S,
        peer: SocketAddr,
        sampler: &'a TrajectorySampler<P>,
        options: SessionOptions,
    ) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Session {
            peer,
            reader: FrameReader::new(
                read_half,
                options.framing,
                options.read_buffer_size,
                options.max_frame_len,
            ),
            writer: FrameWriter::new(write_half, options.framing),
            sampler,
            options,
            state: SessionState::AwaitingRequest,
            stats: SessionStats::default(),
        }
    }

    /// Serve requests until the peer closes the connection
    pub async fn run(mut self) -> Result<SessionStats, ProtocolError> {
        info!(peer = %self.peer, "connected to client");

        let result = self.serve().await;
        self.transition(SessionState::Closed);

        match &result {
            Ok(()) => info!(
                peer = %self.peer,
                requests = self.stats.requests,
                planned = self.stats.planned,
                degraded = self.stats.degraded,
                malformed = self.stats.malformed,
                "session closed"
            ),
            Err(e) => warn!(peer = %self.peer, error = %e, "session ended with error"),
        }
        result.map(|()| self.stats)
    }

    async fn serve(&mut self) -> Result<(), ProtocolError> {
        loop {
            self.transition(SessionState::AwaitingRequest);

            let frame = match self.next_frame().await? {
                Some(frame) => frame,
                None => return Ok(()),
            };
            self.stats.requests += 1;
            debug!(
                peer = %self.peer,
                bytes = frame.len(),
                payload = %String::from_utf8_lossy(&frame),
                "received request"
            );

            match self.handle(&frame) {
                Reply::Trajectory(samples) => {
                    debug!(
                        peer = %self.peer,
                        points = samples.len(),
                        first = ?samples.first(),
                        last = ?samples.last(),
                        "sending trajectory"
                    );
                    let payload = samples.to_vec()?;
                    self.writer.write_frame(&payload).await?;
                }
                Reply::Malformed(e) => match self.options.malformed_requests {
                    MalformedPolicy::Respond => {
                        let payload = ErrorResponse::malformed(e.to_string()).to_vec()?;
                        self.writer.write_frame(&payload).await?;
                    }
                    MalformedPolicy::Close => return Err(e),
                },
            }
        }
    }

    /// Wait for the next frame; an idle timeout counts as the peer going away
    async fn next_frame(&mut self) -> Result<Option<Vec<u8>>, ProtocolError> {
        match self.options.idle_timeout {
            Some(idle) => match tokio::time::timeout(idle, self.reader.read_frame()).await {
                Ok(frame) => frame,
                Err(_) => {
                    info!(peer = %self.peer, timeout = ?idle, "session idle, closing");
                    Ok(None)
                }
            },
            None => self.reader.read_frame().await,
        }
    }

    fn handle(&mut self, frame: &[u8]) -> Reply {
        self.transition(SessionState::Decoding);
        let request = match TrajectoryRequest::from_slice(frame) {
            Ok(request) => request,
            Err(e) => {
                warn!(peer = %self.peer, error = %e, "rejecting malformed request");
                self.stats.malformed += 1;
                self.transition(SessionState::RespondingError);
                return Reply::Malformed(e);
            }
        };
        info!(
            peer = %self.peer,
            start = ?request.start,
            waypoints = request.points.len(),
            end = ?request.end,
            "decoded trajectory request"
        );

        self.transition(SessionState::Sampling);
        let sampler = self.sampler;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| sampler.sample(&request)))
            .unwrap_or_else(|payload| Err(PlannerError::Internal(panic_message(payload))));
        match outcome {
            Ok(samples) => {
                self.stats.planned += 1;
                self.transition(SessionState::RespondingSuccess);
                Reply::Trajectory(samples)
            }
            Err(e) => {
                // The client only ever sees an empty trajectory for planning failures
                warn!(peer = %self.peer, error = %e, "planning failed, responding with empty trajectory");
                self.stats.degraded += 1;
                self.transition(SessionState::RespondingEmpty);
                Reply::Trajectory(SampledTrajectory::empty())
            }
        }
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            debug!(peer = %self.peer, from = ?self.state, to = ?next, "session state");
            self.state = next;
        }
    }
}

/// Text of a caught panic payload
fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => format!("planner panicked: {}", message),
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => format!("planner panicked: {}", message),
            Err(_) => "planner panicked".to_string(),
        },
    }
}
