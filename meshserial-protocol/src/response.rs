//! Typed decoding of command reply payloads.
//!
//! A reply payload is whatever follows the matched response prefix. The
//! decoders here apply the per-command layouts, including undoing the wire
//! reversal of mesh value bytes.

use std::fmt;

use serde::Serialize;

use crate::command::Flag;
use crate::error::ProtocolError;
use crate::opcode::cmd;

/// Restores the natural order of mesh value bytes.
///
/// Value bytes travel reversed on the wire relative to their natural
/// order. The same transform applies in both directions: encoding a
/// `VALUE_SET` and decoding value reports and value events.
pub fn reverse_wire_order(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().rev().copied().collect()
}

/// Firmware build version triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BuildVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl BuildVersion {
    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolError> {
        if payload.len() < 3 {
            return Err(ProtocolError::PayloadTooShort {
                expected: 3,
                actual: payload.len(),
            });
        }
        Ok(Self {
            major: payload[0],
            minor: payload[1],
            patch: payload[2],
        })
    }
}

impl fmt::Display for BuildVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// A handle's value as reported by the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueReport {
    pub handle: u16,
    /// Value bytes in natural order.
    pub data: Vec<u8>,
}

impl ValueReport {
    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolError> {
        if payload.len() < 2 {
            return Err(ProtocolError::PayloadTooShort {
                expected: 2,
                actual: payload.len(),
            });
        }
        Ok(Self {
            handle: u16::from_le_bytes([payload[0], payload[1]]),
            data: reverse_wire_order(&payload[2..]),
        })
    }
}

/// State of a per-handle flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlagState {
    pub handle: u16,
    pub flag_index: u8,
    pub value: bool,
}

impl FlagState {
    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolError> {
        if payload.len() < 4 {
            return Err(ProtocolError::PayloadTooShort {
                expected: 4,
                actual: payload.len(),
            });
        }
        Ok(Self {
            handle: u16::from_le_bytes([payload[0], payload[1]]),
            flag_index: payload[2],
            value: payload[3] != 0,
        })
    }

    /// The flag this state refers to, if the index is a known one.
    pub fn flag(&self) -> Option<Flag> {
        Flag::from_index(self.flag_index)
    }
}

/// Decoded reply to a command, keyed by the issuing command's opcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandReply {
    /// Acknowledged with no payload.
    Done,
    /// Echoed bytes, verbatim.
    Echo(Vec<u8>),
    Value(ValueReport),
    Flag(FlagState),
    Version(BuildVersion),
    AccessAddr(u32),
    Channel(u8),
    IntervalMin(u32),
    /// DFU acknowledgment payload, interpreted by the caller.
    Dfu(Vec<u8>),
    /// Payload for opcodes without a typed layout; opaque bytes.
    Raw { opcode: u8, data: Vec<u8> },
}

impl CommandReply {
    /// Decodes a reply payload according to the command that produced it.
    pub fn decode(opcode: u8, payload: &[u8]) -> Result<Self, ProtocolError> {
        match opcode {
            cmd::ECHO => Ok(CommandReply::Echo(payload.to_vec())),
            cmd::VALUE_GET => Ok(CommandReply::Value(ValueReport::parse(payload)?)),
            cmd::FLAG_GET => Ok(CommandReply::Flag(FlagState::parse(payload)?)),
            cmd::BUILD_VERSION_GET => Ok(CommandReply::Version(BuildVersion::parse(payload)?)),
            cmd::ACCESS_ADDR_GET => Ok(CommandReply::AccessAddr(parse_u32(payload)?)),
            cmd::CHANNEL_GET => {
                if payload.is_empty() {
                    return Err(ProtocolError::PayloadTooShort {
                        expected: 1,
                        actual: 0,
                    });
                }
                Ok(CommandReply::Channel(payload[0]))
            }
            cmd::INTERVAL_MIN_GET => Ok(CommandReply::IntervalMin(parse_u32(payload)?)),
            cmd::DFU_DATA => Ok(CommandReply::Dfu(payload.to_vec())),
            cmd::INIT
            | cmd::START
            | cmd::STOP
            | cmd::VALUE_SET
            | cmd::VALUE_ENABLE
            | cmd::VALUE_DISABLE
            | cmd::FLAG_SET => Ok(CommandReply::Done),
            other => Ok(CommandReply::Raw {
                opcode: other,
                data: payload.to_vec(),
            }),
        }
    }
}

fn parse_u32(payload: &[u8]) -> Result<u32, ProtocolError> {
    if payload.len() < 4 {
        return Err(ProtocolError::PayloadTooShort {
            expected: 4,
            actual: payload.len(),
        });
    }
    Ok(u32::from_le_bytes([
        payload[0], payload[1], payload[2], payload[3],
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverse_wire_order() {
        assert_eq!(reverse_wire_order(&[1, 2, 3]), vec![3, 2, 1]);
        assert_eq!(reverse_wire_order(&[]), Vec::<u8>::new());
    }

    #[test]
    fn test_decode_echo() {
        let reply = CommandReply::decode(cmd::ECHO, &[0x01, 0x02]).unwrap();
        assert_eq!(reply, CommandReply::Echo(vec![0x01, 0x02]));
    }

    #[test]
    fn test_decode_value_report_undoes_reversal() {
        // VALUE_SET of [0, 1, 2] travels as [2, 1, 0]; reading it back
        // must restore the natural order.
        let reply = CommandReply::decode(cmd::VALUE_GET, &[0x00, 0x00, 0x02, 0x01, 0x00]).unwrap();
        assert_eq!(
            reply,
            CommandReply::Value(ValueReport {
                handle: 0,
                data: vec![0x00, 0x01, 0x02],
            })
        );
    }

    #[test]
    fn test_decode_flag_state() {
        let reply = CommandReply::decode(cmd::FLAG_GET, &[0x01, 0x00, 0x00, 0x01]).unwrap();
        let CommandReply::Flag(state) = reply else {
            panic!("expected flag reply");
        };
        assert_eq!(state.handle, 1);
        assert_eq!(state.flag_index, 0);
        assert!(state.value);
        assert_eq!(state.flag(), Some(Flag::Persistence));
    }

    #[test]
    fn test_decode_build_version() {
        let reply = CommandReply::decode(cmd::BUILD_VERSION_GET, &[0x00, 0x08, 0x05]).unwrap();
        let CommandReply::Version(version) = reply else {
            panic!("expected version reply");
        };
        assert_eq!(version.to_string(), "0.8.5");
    }

    #[test]
    fn test_decode_access_addr() {
        let reply =
            CommandReply::decode(cmd::ACCESS_ADDR_GET, &[0xD6, 0xBE, 0x89, 0x8E]).unwrap();
        assert_eq!(reply, CommandReply::AccessAddr(0x8E89_BED6));
    }

    #[test]
    fn test_decode_channel_and_interval() {
        assert_eq!(
            CommandReply::decode(cmd::CHANNEL_GET, &[0x26]).unwrap(),
            CommandReply::Channel(38)
        );
        assert_eq!(
            CommandReply::decode(cmd::INTERVAL_MIN_GET, &[0x64, 0x00, 0x00, 0x00]).unwrap(),
            CommandReply::IntervalMin(100)
        );
    }

    #[test]
    fn test_decode_empty_reply_commands() {
        assert_eq!(
            CommandReply::decode(cmd::START, &[]).unwrap(),
            CommandReply::Done
        );
        assert_eq!(
            CommandReply::decode(cmd::VALUE_SET, &[]).unwrap(),
            CommandReply::Done
        );
    }

    #[test]
    fn test_decode_unknown_opcode_is_raw() {
        let reply = CommandReply::decode(0x7E, &[0xAA]).unwrap();
        assert_eq!(
            reply,
            CommandReply::Raw {
                opcode: 0x7E,
                data: vec![0xAA],
            }
        );
    }

    #[test]
    fn test_decode_truncated_payloads() {
        assert!(CommandReply::decode(cmd::VALUE_GET, &[0x01]).is_err());
        assert!(CommandReply::decode(cmd::FLAG_GET, &[0x01, 0x00, 0x00]).is_err());
        assert!(CommandReply::decode(cmd::BUILD_VERSION_GET, &[0x00]).is_err());
        assert!(CommandReply::decode(cmd::ACCESS_ADDR_GET, &[0xD6, 0xBE]).is_err());
        assert!(CommandReply::decode(cmd::CHANNEL_GET, &[]).is_err());
    }
}
