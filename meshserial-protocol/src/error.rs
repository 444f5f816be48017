//! Protocol error types and device status codes.

use std::fmt;
use thiserror::Error;

/// Errors raised while framing or decoding wire data.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("empty frame")]
    EmptyFrame,

    #[error("length byte {declared} does not match frame size {actual}")]
    LengthMismatch { declared: u8, actual: usize },

    #[error("payload too long: {len} bytes (max {max})")]
    PayloadTooLong { len: usize, max: usize },

    #[error("payload too short: expected at least {expected} bytes, got {actual}")]
    PayloadTooShort { expected: usize, actual: usize },
}

/// Status byte carried in generic command responses.
///
/// `0x00` reports success; `0x80..=0x90` are firmware error codes and
/// `0xF0..=0xFF` are reserved for internal device use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Success,
    ErrorUnknown,
    ErrorInternal,
    ErrorCommandUnknown,
    ErrorDeviceStateInvalid,
    ErrorInvalidLength,
    ErrorInvalidParameter,
    ErrorBusy,
    ErrorInvalidData,
    ErrorPipeInvalid,
    /// `0xF0..=0xFF`, reserved for device-internal use.
    Reserved(u8),
    /// Any other value the firmware may produce.
    Other(u8),
}

impl StatusCode {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => StatusCode::Success,
            0x80 => StatusCode::ErrorUnknown,
            0x81 => StatusCode::ErrorInternal,
            0x82 => StatusCode::ErrorCommandUnknown,
            0x83 => StatusCode::ErrorDeviceStateInvalid,
            0x84 => StatusCode::ErrorInvalidLength,
            0x85 => StatusCode::ErrorInvalidParameter,
            0x86 => StatusCode::ErrorBusy,
            0x87 => StatusCode::ErrorInvalidData,
            0x90 => StatusCode::ErrorPipeInvalid,
            0xF0..=0xFF => StatusCode::Reserved(byte),
            other => StatusCode::Other(other),
        }
    }

    pub fn as_byte(&self) -> u8 {
        match self {
            StatusCode::Success => 0x00,
            StatusCode::ErrorUnknown => 0x80,
            StatusCode::ErrorInternal => 0x81,
            StatusCode::ErrorCommandUnknown => 0x82,
            StatusCode::ErrorDeviceStateInvalid => 0x83,
            StatusCode::ErrorInvalidLength => 0x84,
            StatusCode::ErrorInvalidParameter => 0x85,
            StatusCode::ErrorBusy => 0x86,
            StatusCode::ErrorInvalidData => 0x87,
            StatusCode::ErrorPipeInvalid => 0x90,
            StatusCode::Reserved(byte) | StatusCode::Other(byte) => *byte,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StatusCode::Success)
    }

    /// Whether retrying the same command may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StatusCode::ErrorBusy)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusCode::Success => write!(f, "SUCCESS"),
            StatusCode::ErrorUnknown => write!(f, "ERROR_UNKNOWN"),
            StatusCode::ErrorInternal => write!(f, "ERROR_INTERNAL"),
            StatusCode::ErrorCommandUnknown => write!(f, "ERROR_COMMAND_UNKNOWN"),
            StatusCode::ErrorDeviceStateInvalid => write!(f, "ERROR_DEVICE_STATE_INVALID"),
            StatusCode::ErrorInvalidLength => write!(f, "ERROR_INVALID_LENGTH"),
            StatusCode::ErrorInvalidParameter => write!(f, "ERROR_INVALID_PARAMETER"),
            StatusCode::ErrorBusy => write!(f, "ERROR_BUSY"),
            StatusCode::ErrorInvalidData => write!(f, "ERROR_INVALID_DATA"),
            StatusCode::ErrorPipeInvalid => write!(f, "ERROR_PIPE_INVALID"),
            StatusCode::Reserved(byte) => write!(f, "RESERVED_{byte:02X}"),
            StatusCode::Other(byte) => write!(f, "STATUS_{byte:02X}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_round_trip() {
        for byte in 0..=u8::MAX {
            assert_eq!(StatusCode::from_byte(byte).as_byte(), byte);
        }
    }

    #[test]
    fn test_status_code_success() {
        assert!(StatusCode::from_byte(0x00).is_success());
        assert!(!StatusCode::from_byte(0x80).is_success());
        assert!(!StatusCode::from_byte(0xF3).is_success());
    }

    #[test]
    fn test_status_code_reserved_range() {
        assert_eq!(StatusCode::from_byte(0xF0), StatusCode::Reserved(0xF0));
        assert_eq!(StatusCode::from_byte(0xFF), StatusCode::Reserved(0xFF));
        assert_eq!(StatusCode::from_byte(0x42), StatusCode::Other(0x42));
    }

    #[test]
    fn test_status_code_retryable() {
        assert!(StatusCode::ErrorBusy.is_retryable());
        assert!(!StatusCode::ErrorInvalidParameter.is_retryable());
        assert!(!StatusCode::Success.is_retryable());
    }

    #[test]
    fn test_status_code_display() {
        assert_eq!(StatusCode::Success.to_string(), "SUCCESS");
        assert_eq!(StatusCode::ErrorBusy.to_string(), "ERROR_BUSY");
        assert_eq!(StatusCode::Reserved(0xF3).to_string(), "RESERVED_F3");
        assert_eq!(StatusCode::Other(0x42).to_string(), "STATUS_42");
    }

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::LengthMismatch {
            declared: 5,
            actual: 4,
        };
        assert_eq!(
            err.to_string(),
            "length byte 5 does not match frame size 4"
        );
    }
}
