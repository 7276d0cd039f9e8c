//! Reassembles length-prefixed Java packets out of however the TCP stream
//! happens to chunk them.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use super::deadline::ConnectionDeadline;
use crate::{
    codec::varint::{VarIntError, read_varint},
    error::{Error, Result},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkedState {
    AwaitingLength,
    /// `expected` includes the bytes of the length prefix itself.
    AwaitingBody { expected: usize },
    /// Set when the reader was cancelled or hit a fatal error.
    Failed,
}

/// Accumulates chunks until the leading VarInt length is satisfied.
#[derive(Debug)]
pub struct ChunkedReader {
    state: ChunkedState,
    buf: Vec<u8>,
}

impl Default for ChunkedReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkedReader {
    pub fn new() -> Self {
        Self {
            state: ChunkedState::AwaitingLength,
            buf: Vec::new(),
        }
    }

    pub fn state(&self) -> ChunkedState {
        self.state
    }

    /// Adds a chunk. Returns the full frame (length prefix included) once one
    /// is complete, after which the reader is ready for the next frame.
    pub fn recv(&mut self, chunk: &[u8]) -> Result<Option<Vec<u8>>> {
        if self.state == ChunkedState::Failed {
            return Err(Error::Transport(io::Error::other(
                "reader was cancelled or already failed",
            )));
        }
        self.buf.extend_from_slice(chunk);

        if self.state == ChunkedState::AwaitingLength {
            match read_varint(&self.buf) {
                Ok((length, length_len)) => {
                    let Ok(length) = usize::try_from(length) else {
                        self.state = ChunkedState::Failed;
                        return Err(Error::malformed("length", "negative frame length"));
                    };
                    self.state = ChunkedState::AwaitingBody {
                        expected: length + length_len,
                    };
                }
                // wait for more bytes
                Err(VarIntError::Incomplete) => return Ok(None),
                Err(VarIntError::TooLong) => {
                    self.state = ChunkedState::Failed;
                    return Err(Error::malformed("length", "VarInt is longer than 5 bytes"));
                }
            }
        }

        // the body may have arrived in the same chunk as the length
        let ChunkedState::AwaitingBody { expected } = self.state else {
            return Ok(None);
        };
        let received = self.buf.len();
        if received > expected {
            self.state = ChunkedState::Failed;
            return Err(Error::OverreadFrame { expected, received });
        }
        if received < expected {
            return Ok(None);
        }

        self.state = ChunkedState::AwaitingLength;
        Ok(Some(std::mem::take(&mut self.buf)))
    }

    /// Marks the reader as failed and drops anything buffered.
    pub fn abort(&mut self) {
        self.state = ChunkedState::Failed;
        self.buf.clear();
    }
}

/// Reads whole frames from a stream, giving up when the deadline fires.
pub struct FrameReader<R> {
    stream: R,
    chunked: ChunkedReader,
    deadline: ConnectionDeadline,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(stream: R, deadline: ConnectionDeadline) -> Self {
        Self {
            stream,
            chunked: ChunkedReader::new(),
            deadline,
        }
    }

    pub async fn next_frame(&mut self) -> Result<Vec<u8>> {
        let mut chunk = [0u8; 4096];
        loop {
            let read = tokio::select! {
                biased;
                _ = self.deadline.expired() => {
                    self.chunked.abort();
                    return Err(Error::ConnectionTimeout);
                }
                read = self.stream.read(&mut chunk) => read,
            };
            let n = match read {
                Ok(n) => n,
                Err(e) => {
                    self.chunked.abort();
                    return Err(e.into());
                }
            };
            if n == 0 {
                self.chunked.abort();
                return Err(Error::Transport(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed before the frame was complete",
                )));
            }
            trace!("received {n} byte chunk");
            if let Some(frame) = self.chunked.recv(&chunk[..n])? {
                return Ok(frame);
            }
        }
    }
}
