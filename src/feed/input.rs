use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Closing tag that marks the end of the feed payload.
pub const RSS_CLOSING_TAG: &[u8] = b"</rss>";

/// Size of a single read from the input stream.
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Added to every readiness wait so a zero-second timeout still polls once.
const READY_GRACE: Duration = Duration::from_micros(1);

/// Errors that can occur while reading the feed from the input stream.
#[derive(Debug, Error)]
pub enum InputError {
    /// No data (and no end-of-stream) arrived before the deadline.
    #[error("No feed on input within {0} seconds")]
    Timeout(u64),

    /// The input never contained the `</rss>` closing tag.
    #[error("Feed is truncated: no closing </rss> tag found in {0} bytes of input")]
    Truncation(usize),

    /// Reading from the input stream failed.
    #[error("Failed to read feed input")]
    Io(#[from] std::io::Error),
}

/// Reads one complete feed document from an async byte stream.
///
/// The first read doubles as the readiness check: [`wait_ready`](Self::wait_ready)
/// keeps whatever it received, and [`read_all`](Self::read_all) continues from there.
#[derive(Debug)]
pub struct FeedInput<R> {
    inner: R,
    buf: Vec<u8>,
    eof: bool,
}

impl<R: AsyncRead + Unpin> FeedInput<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            eof: false,
        }
    }

    /// Waits up to `timeout_secs` seconds (plus a microsecond) for the stream
    /// to produce data or reach end-of-stream.
    ///
    /// Returns `Ok(false)` if the deadline passed with nothing to read.
    pub async fn wait_ready(&mut self, timeout_secs: u64) -> Result<bool, InputError> {
        let deadline = Duration::from_secs(timeout_secs) + READY_GRACE;
        let mut chunk = [0u8; READ_CHUNK_SIZE];

        match tokio::time::timeout(deadline, self.inner.read(&mut chunk)).await {
            Ok(Ok(0)) => {
                self.eof = true;
                Ok(true)
            }
            Ok(Ok(n)) => {
                self.buf.extend_from_slice(&chunk[..n]);
                Ok(true)
            }
            Ok(Err(e)) => Err(InputError::Io(e)),
            Err(_) => {
                tracing::debug!(timeout_secs, "Input not ready before deadline");
                Ok(false)
            }
        }
    }

    /// Reads to end-of-stream and returns the payload cut right after the
    /// first `</rss>` tag.
    pub async fn read_all(mut self) -> Result<Vec<u8>, InputError> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        while !self.eof {
            let n = self.inner.read(&mut chunk).await?;
            if n == 0 {
                self.eof = true;
            } else {
                self.buf.extend_from_slice(&chunk[..n]);
            }
        }

        tracing::debug!(bytes = self.buf.len(), "Read feed input");
        truncate_after_closing_tag(self.buf)
    }
}

/// Cuts `bytes` immediately after the first `</rss>` tag, discarding any
/// trailing data.
pub fn truncate_after_closing_tag(mut bytes: Vec<u8>) -> Result<Vec<u8>, InputError> {
    let end = bytes
        .windows(RSS_CLOSING_TAG.len())
        .position(|window| window == RSS_CLOSING_TAG)
        .map(|pos| pos + RSS_CLOSING_TAG.len())
        .ok_or(InputError::Truncation(bytes.len()))?;

    if end < bytes.len() {
        tracing::debug!(discarded = bytes.len() - end, "Discarding input after </rss>");
    }
    bytes.truncate(end);
    Ok(bytes)
}
