//! Error types for brnboot.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type for brnboot operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for brnboot operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error while writing to or flushing the port.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// The port could not be opened, is already in use, or has been closed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A state or control-character wait ran out of time.
    #[error("Timeout after {timeout:?} waiting for {waiting_for}")]
    Timeout {
        /// What the wait was looking for.
        waiting_for: String,
        /// The budget that expired.
        timeout: Duration,
    },

    /// A line was requested from an empty line queue.
    #[error("No completed line available")]
    EmptyQueue,

    /// A memory dump line carried a segment that is not a hex byte.
    #[error("Malformed dump line: segment {segment} of {line:?} is not a hex byte")]
    MalformedResponse {
        /// The offending line as received.
        line: String,
        /// Index of the bad segment within the line.
        segment: usize,
    },

    /// A 4-byte write never reported completion.
    #[error("Write at 0x{address:X} failed after {attempts} attempts")]
    WriteFailed {
        /// Address of the chunk that failed.
        address: u64,
        /// Number of attempts made.
        attempts: u32,
    },

    /// A dump stopped making progress.
    #[error("Dump stalled at 0x{address:X}: {attempts} consecutive blocks returned no data")]
    Stalled {
        /// Address the dump could not get past.
        address: u64,
        /// Number of consecutive empty blocks.
        attempts: u32,
    },

    /// An argument was out of range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Build a [`Error::Timeout`].
    pub fn timeout(waiting_for: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            waiting_for: waiting_for.into(),
            timeout,
        }
    }

    /// Whether this is a [`Error::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
