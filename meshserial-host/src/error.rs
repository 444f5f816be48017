//! Host-side error types.

use meshserial_protocol::{ProtocolError, StatusCode};
use thiserror::Error;

/// Errors surfaced by the connection engine and the device API.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The device answered the command with a non-success status byte.
    #[error("device reported {status} for {command}")]
    Status {
        command: &'static str,
        status: StatusCode,
    },

    /// The response at the head of the queue did not match what the
    /// command expected.
    #[error("{command} response mismatch: expected prefix {expected:02X?}, got frame {frame:02X?}")]
    PrefixMismatch {
        command: &'static str,
        expected: Vec<u8>,
        frame: Vec<u8>,
    },

    #[error("{command} timed out after {timeout_ms} ms")]
    Timeout {
        command: &'static str,
        timeout_ms: u64,
    },

    #[error("connection closed")]
    ConnectionClosed,

    #[error("not connected")]
    NotConnected,

    /// The reply decoded, but not to the shape the command implies.
    #[error("unexpected reply shape for {command}")]
    UnexpectedReply { command: &'static str },
}

impl HostError {
    /// Whether retrying the same command may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            HostError::Status { status, .. } => status.is_retryable(),
            HostError::Timeout { .. } => true,
            _ => false,
        }
    }
}
