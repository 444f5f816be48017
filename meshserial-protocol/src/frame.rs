//! Length-prefixed serial frame format.
//!
//! Every frame starts with a one-byte length prefix followed by an opcode
//! and an optional payload:
//!
//! ```text
//! +--------+--------+---------------+
//! | length | opcode | payload       |
//! | 1 byte | 1 byte | 0..=253 bytes |
//! +--------+--------+---------------+
//! ```
//!
//! The length byte counts every byte after itself, so a complete frame
//! occupies `length + 1` bytes. The degenerate acknowledgment frame is the
//! single byte `[0x00]`: length zero, no opcode, no payload.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;
use crate::MAX_PAYLOAD_LEN;

/// A complete, validated frame.
///
/// Invariant: `bytes[0] as usize + 1 == bytes.len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Bytes,
}

impl Frame {
    /// Builds an outgoing frame from an opcode and payload.
    pub fn build(opcode: u8, payload: &[u8]) -> Result<Self, ProtocolError> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(ProtocolError::PayloadTooLong {
                len: payload.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }
        let mut buf = BytesMut::with_capacity(payload.len() + 2);
        buf.put_u8((payload.len() + 1) as u8);
        buf.put_u8(opcode);
        buf.put_slice(payload);
        Ok(Self {
            bytes: buf.freeze(),
        })
    }

    /// Validates raw bytes as a complete frame.
    pub fn from_bytes(bytes: Bytes) -> Result<Self, ProtocolError> {
        let declared = *bytes.first().ok_or(ProtocolError::EmptyFrame)?;
        if declared as usize + 1 != bytes.len() {
            return Err(ProtocolError::LengthMismatch {
                declared,
                actual: bytes.len(),
            });
        }
        Ok(Self { bytes })
    }

    /// Wraps bytes the reassembler already sized against the length prefix.
    pub(crate) fn from_reassembled(bytes: Bytes) -> Self {
        debug_assert_eq!(bytes[0] as usize + 1, bytes.len());
        Self { bytes }
    }

    /// The length prefix (total frame size minus one).
    pub fn length_byte(&self) -> u8 {
        self.bytes[0]
    }

    /// The opcode, absent for the degenerate acknowledgment frame.
    pub fn opcode(&self) -> Option<u8> {
        self.bytes.get(1).copied()
    }

    /// Payload bytes after the opcode.
    pub fn payload(&self) -> &[u8] {
        if self.bytes.len() > 2 {
            &self.bytes[2..]
        } else {
            &[]
        }
    }

    /// Whether this is the degenerate `[0x00]` acknowledgment frame.
    pub fn is_ack(&self) -> bool {
        self.bytes.len() == 1
    }

    /// Raw frame bytes, length prefix included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the frame, returning the raw bytes.
    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}
