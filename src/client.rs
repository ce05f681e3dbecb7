//! Client for the trajectory service
//!
//! Used by field tools and by the integration tests. Responses are read until a
//! complete JSON document has arrived, so large trajectories split across several
//! TCP segments are handled in either framing mode.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::debug;

use crate::common::{ErrorResponse, SampledTrajectory, TrajectoryRequest};
use crate::config::Framing;
use crate::error::ProtocolError;

/// Reply to one request
#[derive(Debug, Clone, PartialEq)]
pub enum TrajectoryReply {
    Trajectory(SampledTrajectory),
    Rejected(ErrorResponse),
}

pub struct TrajectoryClient {
    stream: TcpStream,
    framing: Framing,
    pending: Vec<u8>,
}

impl TrajectoryClient {
    /// Connect to a running trajectory server
    pub async fn connect<A: ToSocketAddrs>(addr: A, framing: Framing) -> Result<Self, ProtocolError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(TrajectoryClient {
            stream,
            framing,
            pending: Vec::new(),
        })
    }

    /// Send a request and wait for the sampled trajectory
    ///
    /// An empty trajectory means the server could not plan a path.
    pub async fn sample(&mut self, request: &TrajectoryRequest) -> Result<SampledTrajectory, ProtocolError> {
        match self.request(request).await? {
            TrajectoryReply::Trajectory(samples) => Ok(samples),
            TrajectoryReply::Rejected(body) => Err(ProtocolError::Rejected(body.message)),
        }
    }

    pub async fn request(&mut self, request: &TrajectoryRequest) -> Result<TrajectoryReply, ProtocolError> {
        let payload = request.to_vec()?;
        self.send_raw(&payload).await?;
        self.read_reply().await
    }

    /// Send raw bytes as one message
    pub async fn send_raw(&mut self, payload: &[u8]) -> Result<(), ProtocolError> {
        self.stream.write_all(payload).await?;
        if self.framing == Framing::Lines {
            self.stream.write_all(b"\n").await?;
        }
        self.stream.flush().await?;
        Ok(())
    }

    /// Read the next complete reply document
    pub async fn read_reply(&mut self) -> Result<TrajectoryReply, ProtocolError> {
        let mut buf = [0u8; 4096];
        loop {
            if let Some(reply) = self.take_document()? {
                return Ok(reply);
            }
            let n = self.stream.read(&mut buf).await?;
            if n == 0 {
                return Err(ProtocolError::UnexpectedEof);
            }
            self.pending.extend_from_slice(&buf[..n]);
        }
    }

    /// Close the write side so the server sees a zero-byte read
    pub async fn close(mut self) -> Result<(), ProtocolError> {
        self.stream.shutdown().await?;
        Ok(())
    }

    fn take_document(&mut self) -> Result<Option<TrajectoryReply>, ProtocolError> {
        let start = match self.pending.iter().position(|b| !b.is_ascii_whitespace()) {
            Some(start) => start,
            None => {
                self.pending.clear();
                return Ok(None);
            }
        };

        let mut stream =
            serde_json::Deserializer::from_slice(&self.pending[start..]).into_iter::<serde_json::Value>();
        let value = match stream.next() {
            Some(Ok(value)) => value,
            Some(Err(e)) if e.is_eof() => return Ok(None),
            Some(Err(e)) => return Err(ProtocolError::MalformedResponse(e)),
            None => return Ok(None),
        };
        let consumed = start + stream.byte_offset();
        self.pending.drain(..consumed);
        debug!(consumed, "received reply");

        let reply = if value.is_array() {
            TrajectoryReply::Trajectory(
                serde_json::from_value(value).map_err(ProtocolError::MalformedResponse)?,
            )
        } else {
            TrajectoryReply::Rejected(
                serde_json::from_value(value).map_err(ProtocolError::MalformedResponse)?,
            )
        };
        Ok(Some(reply))
    }
}
