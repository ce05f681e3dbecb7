//! Message framing on the session stream
//!
//! `Chunk` framing treats each transport read as a complete document. A request
//! larger than one read, or split by the network, will not decode; clients that
//! need large payloads should use `Lines`.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::config::Framing;
use crate::error::ProtocolError;

/// Reads one request frame at a time
pub struct FrameReader<R> {
    reader: BufReader<R>,
    framing: Framing,
    read_buffer_size: usize,
    max_frame_len: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R, framing: Framing, read_buffer_size: usize, max_frame_len: usize) -> Self {
        FrameReader {
            reader: BufReader::new(reader),
            framing,
            read_buffer_size,
            max_frame_len,
        }
    }

    /// Next frame, or `None` once the peer has closed its side
    pub async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, ProtocolError> {
        match self.framing {
            Framing::Chunk => self.read_chunk().await,
            Framing::Lines => self.read_line().await,
        }
    }

    async fn read_chunk(&mut self) -> Result<Option<Vec<u8>>, ProtocolError> {
        let mut buf = vec![0u8; self.read_buffer_size];
        let n = self.reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(buf))
    }

    async fn read_line(&mut self) -> Result<Option<Vec<u8>>, ProtocolError> {
        loop {
            let mut line = Vec::new();
            let limit = self.max_frame_len as u64 + 1;
            let n = (&mut self.reader).take(limit).read_until(b'\n', &mut line).await?;
            if n == 0 {
                return Ok(None);
            }

            let terminated = line.last() == Some(&b'\n');
            if !terminated && n as u64 == limit {
                return Err(ProtocolError::FrameTooLarge {
                    limit: self.max_frame_len,
                });
            }

            while matches!(line.last(), Some(b'\n') | Some(b'\r')) {
                line.pop();
            }
            if line.len() > self.max_frame_len {
                return Err(ProtocolError::FrameTooLarge {
                    limit: self.max_frame_len,
                });
            }
            // Blank keep-alive lines carry no request
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Ok(Some(line));
        }
    }
}

/// Writes response frames
pub struct FrameWriter<W> {
    writer: W,
    framing: Framing,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W, framing: Framing) -> Self {
        FrameWriter { writer, framing }
    }

    /// Write one complete message and flush it
    pub async fn write_frame(&mut self, payload: &[u8]) -> Result<(), ProtocolError> {
        self.writer.write_all(payload).await?;
        if self.framing == Framing::Lines {
            self.writer.write_all(b"\n").await?;
        }
        self.writer.flush().await?;
        Ok(())
    }
}
