//! Unsolicited event frames.
//!
//! Decoding is total: an opcode without a decoder, or a payload shorter
//! than its layout, comes back as [`Event::Unknown`] rather than an error.
//! Events are diagnostics and data for subscribers; a malformed one must
//! never take the read loop down.

use serde::Serialize;

use crate::error::ProtocolError;
use crate::frame::Frame;
use crate::opcode::rsp;
use crate::response::reverse_wire_order;

/// Device start-up report, sent after power-on or a radio reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StartedReport {
    pub operating_mode: u8,
    pub hw_error: u8,
    pub data_credit_available: u8,
}

impl StartedReport {
    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolError> {
        if payload.len() < 3 {
            return Err(ProtocolError::PayloadTooShort {
                expected: 3,
                actual: payload.len(),
            });
        }
        Ok(Self {
            operating_mode: payload[0],
            hw_error: payload[1],
            data_credit_available: payload[2],
        })
    }
}

/// An unsolicited notification from the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The device (re)started.
    DeviceStarted(StartedReport),
    /// A value for a previously unseen handle arrived over the mesh.
    New { handle: u16, data: Vec<u8> },
    /// A known handle's value was updated over the mesh.
    Update { handle: u16, data: Vec<u8> },
    /// A conflicting value for a handle arrived over the mesh.
    Conflicting { handle: u16, data: Vec<u8> },
    /// This device broadcast a handle's value.
    Tx { handle: u16, data: Vec<u8> },
    /// DFU traffic, opaque at this layer.
    Dfu { data: Vec<u8> },
    /// Opcode without a decoder; payload is opaque bytes.
    Unknown { opcode: u8, data: Vec<u8> },
}

impl Event {
    /// Decodes an event frame. Never fails.
    pub fn decode(frame: &Frame) -> Self {
        let Some(opcode) = frame.opcode() else {
            return Event::Unknown {
                opcode: 0x00,
                data: Vec::new(),
            };
        };
        let payload = frame.payload();
        match opcode {
            rsp::DEVICE_STARTED => match StartedReport::parse(payload) {
                Ok(report) => Event::DeviceStarted(report),
                Err(_) => Event::Unknown {
                    opcode,
                    data: payload.to_vec(),
                },
            },
            rsp::EVENT_NEW | rsp::EVENT_UPDATE | rsp::EVENT_CONFLICTING | rsp::EVENT_TX => {
                if payload.len() < 2 {
                    return Event::Unknown {
                        opcode,
                        data: payload.to_vec(),
                    };
                }
                let handle = u16::from_le_bytes([payload[0], payload[1]]);
                let data = reverse_wire_order(&payload[2..]);
                match opcode {
                    rsp::EVENT_NEW => Event::New { handle, data },
                    rsp::EVENT_UPDATE => Event::Update { handle, data },
                    rsp::EVENT_CONFLICTING => Event::Conflicting { handle, data },
                    _ => Event::Tx { handle, data },
                }
            }
            rsp::EVENT_DFU => Event::Dfu {
                data: payload.to_vec(),
            },
            _ => Event::Unknown {
                opcode,
                data: payload.to_vec(),
            },
        }
    }

    /// Event name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Event::DeviceStarted(_) => "device_started",
            Event::New { .. } => "new",
            Event::Update { .. } => "update",
            Event::Conflicting { .. } => "conflicting",
            Event::Tx { .. } => "tx",
            Event::Dfu { .. } => "dfu",
            Event::Unknown { .. } => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_device_started() {
        let frame = Frame::build(0x81, &[0x00, 0x00, 0x17]).unwrap();
        let event = Event::decode(&frame);
        assert_eq!(
            event,
            Event::DeviceStarted(StartedReport {
                operating_mode: 0,
                hw_error: 0,
                data_credit_available: 0x17,
            })
        );
        assert_eq!(event.name(), "device_started");
    }

    #[test]
    fn test_decode_value_events_undo_reversal() {
        let frame = Frame::build(0xB4, &[0x01, 0x00, 0x03, 0x02, 0x01]).unwrap();
        assert_eq!(
            Event::decode(&frame),
            Event::Update {
                handle: 1,
                data: vec![0x01, 0x02, 0x03],
            }
        );

        let frame = Frame::build(0xB3, &[0x02, 0x00]).unwrap();
        assert_eq!(
            Event::decode(&frame),
            Event::New {
                handle: 2,
                data: vec![],
            }
        );
    }

    #[test]
    fn test_decode_conflicting_and_tx() {
        let frame = Frame::build(0xB5, &[0x05, 0x00, 0xFF]).unwrap();
        assert!(matches!(
            Event::decode(&frame),
            Event::Conflicting { handle: 5, .. }
        ));

        let frame = Frame::build(0xB6, &[0x05, 0x00]).unwrap();
        assert!(matches!(Event::decode(&frame), Event::Tx { handle: 5, .. }));
    }

    #[test]
    fn test_decode_dfu() {
        let frame = Frame::build(0x78, &[0xFE, 0xFF]).unwrap();
        assert_eq!(
            Event::decode(&frame),
            Event::Dfu {
                data: vec![0xFE, 0xFF],
            }
        );
    }

    #[test]
    fn test_decode_unknown_opcode() {
        let frame = Frame::build(0xC1, &[0x01]).unwrap();
        assert_eq!(
            Event::decode(&frame),
            Event::Unknown {
                opcode: 0xC1,
                data: vec![0x01],
            }
        );
    }

    #[test]
    fn test_decode_truncated_event_is_unknown() {
        // One byte short of the smallest value-event layout.
        let frame = Frame::build(0xB3, &[0x01]).unwrap();
        assert_eq!(
            Event::decode(&frame),
            Event::Unknown {
                opcode: 0xB3,
                data: vec![0x01],
            }
        );

        let frame = Frame::build(0x81, &[0x00]).unwrap();
        assert!(matches!(Event::decode(&frame), Event::Unknown { .. }));
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = Event::Update {
            handle: 1,
            data: vec![0x0A],
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"update","handle":1,"data":[10]}"#);
    }
}
