use std::io::{ErrorKind, Read};

use crate::error::{TilewireError, TilewireResult};

/// Outcome of an exact-fill read against the renderer's output pipe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadStatus {
    /// The buffer was filled completely.
    Complete,
    /// The source closed before the buffer was full. `received` is the number
    /// of bytes that arrived before closure; `0` at a chunk boundary is the
    /// clean end of the stream, anything else is a truncation.
    Closed { received: usize },
}

/// Exact-read layer over the renderer's byte stream.
///
/// The underlying source is a pipe and may deliver fewer bytes than requested
/// per call, so every read loops until the buffer is full or the source
/// closes. A short buffer is never handed back silently.
pub struct ChunkReader<R> {
    source: R,
}

impl<R: Read> ChunkReader<R> {
    pub fn new(source: R) -> Self {
        Self { source }
    }

    /// Reads exactly `buf.len()` bytes, or reports how far the stream got
    /// before closing.
    pub fn fill(&mut self, buf: &mut [u8]) -> TilewireResult<ReadStatus> {
        let mut received = 0;
        while received < buf.len() {
            match self.source.read(&mut buf[received..]) {
                Ok(0) => return Ok(ReadStatus::Closed { received }),
                Ok(n) => received += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(TilewireError::Io(e)),
            }
        }
        Ok(ReadStatus::Complete)
    }
}
