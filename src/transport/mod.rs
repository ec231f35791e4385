//! # Frame Transport Module
//!
//! Turns the raw serial byte stream into discrete frames.
//!
//! This module handles:
//! - Accumulating bytes until the two-byte frame terminator
//! - Resynchronizing frame boundaries after corrupted/partial reads
//! - Command write passthrough
//! - Deadline-bounded reads with cooperative cancellation

pub mod link;

use bytes::{BufMut, BytesMut};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::FramingConfig;
use crate::error::{BenchError, Result};
use crate::protocol::wire::FRAME_BUF_SIZE;

pub use link::{available_ports, SerialLink, TokioSerialLink};

/// Framed reader/writer over a raw serial link
pub struct FrameTransport<L: SerialLink> {
    link: L,
    terminator: [u8; 2],
    resync_byte_limit: usize,
}

impl<L: SerialLink> FrameTransport<L> {
    pub fn new(link: L, framing: &FramingConfig) -> Self {
        Self {
            link,
            terminator: framing.terminator,
            resync_byte_limit: framing.resync_byte_limit,
        }
    }

    /// Frame terminator in effect on this link
    pub fn terminator(&self) -> [u8; 2] {
        self.terminator
    }

    /// Read one complete frame, returning its body without the terminator
    ///
    /// Bytes accumulate until the last two equal the terminator. A read
    /// error drops the partial buffer, resynchronizes, and restarts
    /// accumulation. If the buffer fills without a terminator, the full
    /// buffer is returned as a degraded frame and a warning is logged;
    /// that is a recoverable condition, not an error.
    pub async fn read_single_message(&mut self) -> Result<Vec<u8>> {
        let mut buf = BytesMut::with_capacity(FRAME_BUF_SIZE);

        loop {
            match self.link.read_byte().await {
                Ok(byte) => {
                    buf.put_u8(byte);

                    let n = buf.len();
                    if n >= 2 && buf[n - 2..] == self.terminator {
                        buf.truncate(n - 2);
                        return Ok(buf.to_vec());
                    }

                    if n >= FRAME_BUF_SIZE {
                        warn!(
                            len = n,
                            "no terminator within buffer capacity, returning truncated frame"
                        );
                        return Ok(buf.to_vec());
                    }
                }
                Err(e) => {
                    warn!("read error mid-frame, dropping partial buffer: {}", e);
                    self.resynchronize().await?;
                    buf.clear();
                }
            }
        }
    }

    /// Discard bytes until a frame boundary (the terminator) is seen
    ///
    /// Consumes at most `resync_byte_limit` bytes; past that the link is
    /// reported desynchronized instead of looping forever. Read errors
    /// while resynchronizing are logged and consume budget.
    pub async fn resynchronize(&mut self) -> Result<()> {
        warn!("resynchronizing serial link");

        let mut window = [0u8; 2];
        let mut consumed = 0usize;

        while consumed < self.resync_byte_limit {
            match self.link.read_byte().await {
                Ok(byte) => {
                    window[0] = window[1];
                    window[1] = byte;
                    consumed += 1;

                    if window == self.terminator {
                        debug!(consumed, "serial link realigned");
                        return Ok(());
                    }
                }
                Err(e) => {
                    warn!("read error while resynchronizing: {}", e);
                    consumed += 1;
                }
            }
        }

        Err(BenchError::Desynchronized(self.resync_byte_limit))
    }

    /// Write exactly the given bytes and flush
    ///
    /// I/O errors are logged and surfaced to the caller, never retried.
    pub async fn write_message(&mut self, bytes: &[u8]) -> Result<()> {
        self.link.write_all(bytes).await.map_err(|e| {
            warn!("failed to write frame: {}", e);
            BenchError::Link(format!("failed to write frame: {}", e))
        })?;

        self.link.flush().await.map_err(|e| {
            warn!("failed to flush serial link: {}", e);
            BenchError::Link(format!("failed to flush serial link: {}", e))
        })?;

        debug!("wrote frame ({} bytes)", bytes.len());
        Ok(())
    }

    /// Read one frame, bounded by a deadline
    ///
    /// On expiry the pending read future is dropped, which halts the
    /// underlying I/O instead of leaving a stray read behind, and a
    /// timeout error is returned.
    pub async fn read_or_timeout(&mut self, deadline: Duration) -> Result<Vec<u8>> {
        match tokio::time::timeout(deadline, self.read_single_message()).await {
            Ok(result) => result,
            Err(_) => Err(BenchError::Timeout(deadline)),
        }
    }
}
