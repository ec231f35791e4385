//! # Error Types
//!
//! Custom error types for the avionics bench using `thiserror`.

use std::time::Duration;
use thiserror::Error;

/// Main error type for the avionics bench
#[derive(Debug, Error)]
pub enum BenchError {
    /// Serial link errors (open/read/write)
    #[error("serial link error: {0}")]
    Link(String),

    /// A bounded read did not complete before its deadline
    #[error("read timed out after {0:?}")]
    Timeout(Duration),

    /// Resynchronization gave up before finding a frame boundary
    #[error("link desynchronized: no frame boundary within {0} bytes")]
    Desynchronized(usize),

    /// Response payload shorter than the record's fixed layout
    #[error("payload too short: expected {expected} bytes, got {actual}")]
    Decode { expected: usize, actual: usize },

    /// Response byte does not echo the opcode that was sent
    #[error("acknowledgment mismatch: sent 0x{sent:02X}, got 0x{got:02X}")]
    AckMismatch { sent: u8, got: u8 },

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the avionics bench
pub type Result<T> = std::result::Result<T, BenchError>;
