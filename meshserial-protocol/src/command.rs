//! Typed commands and their response expectations.
//!
//! Every command knows how to encode itself into a wire frame and which
//! response frames will satisfy it, so the issue path can derive both from
//! one value and the decode path never guesses.

use bytes::Bytes;

use crate::error::ProtocolError;
use crate::frame::Frame;
use crate::opcode::{cmd, rsp};
use crate::response::reverse_wire_order;

/// Per-handle flags the device stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    /// Persist the handle's value across radio resets.
    Persistence,
    /// Report a TX event each time the handle's value is broadcast.
    TxEvent,
}

impl Flag {
    pub fn index(self) -> u8 {
        match self {
            Flag::Persistence => 0,
            Flag::TxEvent => 1,
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Flag::Persistence),
            1 => Some(Flag::TxEvent),
            _ => None,
        }
    }
}

/// A command understood by the device.
///
/// Multi-byte fields encode little-endian. Mesh value bytes travel
/// reversed on the wire: [`Command::encode`] applies the reversal for
/// `ValueSet` and the decoders in [`crate::response`] and [`crate::event`]
/// undo it on the way back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Ask the device to echo bytes back verbatim.
    Echo(Vec<u8>),
    /// Reset the radio. Completes when the device reports it started.
    RadioReset,
    /// Configure access address, minimum rebroadcast interval and channel.
    Init {
        access_addr: u32,
        interval_min_ms: u32,
        channel: u8,
    },
    /// Begin broadcasting.
    Start,
    /// Stop broadcasting.
    Stop,
    /// Publish a new value for a handle.
    ValueSet { handle: u16, data: Vec<u8> },
    /// Re-enable rebroadcast of a handle.
    ValueEnable { handle: u16 },
    /// Stop rebroadcasting a handle.
    ValueDisable { handle: u16 },
    /// Set a per-handle flag.
    FlagSet { handle: u16, flag: Flag, value: bool },
    /// Read a per-handle flag.
    FlagGet { handle: u16, flag: Flag },
    /// Push one DFU packet. The payload is relayed as-is.
    DfuData(Vec<u8>),
    /// Read a handle's current value.
    ValueGet { handle: u16 },
    /// Read the firmware build version.
    BuildVersionGet,
    /// Read the configured access address.
    AccessAddrGet,
    /// Read the configured advertising channel.
    ChannelGet,
    /// Read the configured minimum rebroadcast interval.
    IntervalMinGet,
    /// Escape hatch for opcodes without a typed variant. The device is
    /// expected to answer with a generic command response.
    Raw { opcode: u8, payload: Vec<u8> },
}

impl Command {
    /// Wire opcode for this command.
    pub fn opcode(&self) -> u8 {
        match self {
            Command::Echo(_) => cmd::ECHO,
            Command::RadioReset => cmd::RADIO_RESET,
            Command::Init { .. } => cmd::INIT,
            Command::Start => cmd::START,
            Command::Stop => cmd::STOP,
            Command::ValueSet { .. } => cmd::VALUE_SET,
            Command::ValueEnable { .. } => cmd::VALUE_ENABLE,
            Command::ValueDisable { .. } => cmd::VALUE_DISABLE,
            Command::FlagSet { .. } => cmd::FLAG_SET,
            Command::FlagGet { .. } => cmd::FLAG_GET,
            Command::DfuData(_) => cmd::DFU_DATA,
            Command::ValueGet { .. } => cmd::VALUE_GET,
            Command::BuildVersionGet => cmd::BUILD_VERSION_GET,
            Command::AccessAddrGet => cmd::ACCESS_ADDR_GET,
            Command::ChannelGet => cmd::CHANNEL_GET,
            Command::IntervalMinGet => cmd::INTERVAL_MIN_GET,
            Command::Raw { opcode, .. } => *opcode,
        }
    }

    /// Command name for logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Echo(_) => "ECHO",
            Command::RadioReset => "RADIO_RESET",
            Command::Init { .. } => "INIT",
            Command::Start => "START",
            Command::Stop => "STOP",
            Command::ValueSet { .. } => "VALUE_SET",
            Command::ValueEnable { .. } => "VALUE_ENABLE",
            Command::ValueDisable { .. } => "VALUE_DISABLE",
            Command::FlagSet { .. } => "FLAG_SET",
            Command::FlagGet { .. } => "FLAG_GET",
            Command::DfuData(_) => "DFU_DATA",
            Command::ValueGet { .. } => "VALUE_GET",
            Command::BuildVersionGet => "BUILD_VERSION_GET",
            Command::AccessAddrGet => "ACCESS_ADDR_GET",
            Command::ChannelGet => "CHANNEL_GET",
            Command::IntervalMinGet => "INTERVAL_MIN_GET",
            Command::Raw { .. } => "RAW",
        }
    }

    /// Encodes the command into a complete wire frame.
    pub fn encode(&self) -> Result<Bytes, ProtocolError> {
        let payload = match self {
            Command::Echo(data) => data.clone(),
            Command::RadioReset
            | Command::Start
            | Command::Stop
            | Command::BuildVersionGet
            | Command::AccessAddrGet
            | Command::ChannelGet
            | Command::IntervalMinGet => Vec::new(),
            Command::Init {
                access_addr,
                interval_min_ms,
                channel,
            } => {
                let mut payload = Vec::with_capacity(9);
                payload.extend_from_slice(&access_addr.to_le_bytes());
                payload.extend_from_slice(&interval_min_ms.to_le_bytes());
                payload.push(*channel);
                payload
            }
            Command::ValueSet { handle, data } => {
                let mut payload = Vec::with_capacity(2 + data.len());
                payload.extend_from_slice(&handle.to_le_bytes());
                payload.extend_from_slice(&reverse_wire_order(data));
                payload
            }
            Command::ValueEnable { handle }
            | Command::ValueDisable { handle }
            | Command::ValueGet { handle } => handle.to_le_bytes().to_vec(),
            Command::FlagSet {
                handle,
                flag,
                value,
            } => {
                let mut payload = handle.to_le_bytes().to_vec();
                payload.push(flag.index());
                payload.push(u8::from(*value));
                payload
            }
            Command::FlagGet { handle, flag } => {
                let mut payload = handle.to_le_bytes().to_vec();
                payload.push(flag.index());
                payload
            }
            Command::DfuData(data) => data.clone(),
            Command::Raw { payload, .. } => payload.clone(),
        };
        Ok(Frame::build(self.opcode(), &payload)?.into_bytes())
    }

    /// Response stages expected for this command, in arrival order.
    ///
    /// Most commands resolve in a single stage. Radio reset takes two: the
    /// device acknowledges with `[0x00]`, then reports that it started.
    pub fn response_stages(&self) -> Vec<ResponsePrefix> {
        match self {
            Command::Echo(data) => {
                vec![ResponsePrefix::exact(vec![
                    (data.len() + 1) as u8,
                    rsp::ECHO_RSP,
                ])]
            }
            Command::RadioReset => vec![
                ResponsePrefix::exact(vec![0x00]),
                ResponsePrefix::from_opcode(vec![rsp::DEVICE_STARTED]).completed_by_event(),
            ],
            // Fixed-size replies: [0x03, CMD_RSP, opcode, status].
            Command::Init { .. }
            | Command::Start
            | Command::Stop
            | Command::ValueSet { .. }
            | Command::ValueEnable { .. }
            | Command::ValueDisable { .. }
            | Command::FlagSet { .. } => {
                vec![
                    ResponsePrefix::exact(vec![0x03, rsp::CMD_RSP, self.opcode(), 0x00])
                        .with_status_at(3),
                ]
            }
            // Variable-size replies: the length byte is unknown until the
            // reply arrives, so match from the opcode onward.
            Command::FlagGet { .. }
            | Command::DfuData(_)
            | Command::ValueGet { .. }
            | Command::BuildVersionGet
            | Command::AccessAddrGet
            | Command::ChannelGet
            | Command::IntervalMinGet
            | Command::Raw { .. } => {
                vec![
                    ResponsePrefix::from_opcode(vec![rsp::CMD_RSP, self.opcode(), 0x00])
                        .with_status_at(2),
                ]
            }
        }
    }
}

/// Expected leading bytes of one response stage.
///
/// The pattern either covers the whole frame from the length byte
/// ([`ResponsePrefix::exact`]) or starts at the opcode byte when the reply
/// size is unknown at issue time ([`ResponsePrefix::from_opcode`]).
/// Generic command responses carry a status byte inside the pattern;
/// [`ResponsePrefix::with_status_at`] marks its position so a firmware
/// error status resolves as a device status instead of a mismatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsePrefix {
    bytes: Vec<u8>,
    skip_length: bool,
    status_at: Option<usize>,
    event_completion: bool,
}

impl ResponsePrefix {
    /// Pattern matched against the whole frame, length byte included.
    pub fn exact(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            skip_length: false,
            status_at: None,
            event_completion: false,
        }
    }

    /// Pattern matched from the opcode byte, ignoring the length prefix.
    pub fn from_opcode(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            skip_length: true,
            status_at: None,
            event_completion: false,
        }
    }

    /// Marks the status byte position within the pattern.
    pub fn with_status_at(mut self, index: usize) -> Self {
        self.status_at = Some(index);
        self
    }

    /// Marks a stage satisfied by an event-classified frame. Radio reset
    /// uses this: its final stage is the device-started report.
    pub fn completed_by_event(mut self) -> Self {
        self.event_completion = true;
        self
    }

    pub fn is_event_completion(&self) -> bool {
        self.event_completion
    }

    /// Expected bytes, for diagnostics.
    pub fn expected_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Matches a frame against this pattern.
    pub fn check(&self, frame: &Frame) -> PrefixCheck {
        let raw = frame.as_bytes();
        let offset = usize::from(self.skip_length);
        if raw.len() < offset {
            return PrefixCheck::Mismatch;
        }
        let window = &raw[offset..];
        if window.len() < self.bytes.len() {
            return PrefixCheck::Mismatch;
        }
        for (index, (&actual, &expected)) in window.iter().zip(self.bytes.iter()).enumerate() {
            if actual != expected {
                // Every byte before the status position matched, so this
                // frame is the reply; the device is reporting a failure.
                if self.status_at == Some(index) {
                    return PrefixCheck::Status(actual);
                }
                return PrefixCheck::Mismatch;
            }
        }
        PrefixCheck::Match {
            payload_start: offset + self.bytes.len(),
        }
    }
}

/// Outcome of matching a frame against a [`ResponsePrefix`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixCheck {
    /// The frame satisfies the stage; the reply payload begins at
    /// `payload_start` within the raw frame bytes.
    Match { payload_start: usize },
    /// The frame is the reply, but its status byte reports an error.
    Status(u8),
    /// The frame does not correspond to this expectation.
    Mismatch,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_echo() {
        let frame = Command::Echo(vec![0x01]).encode().unwrap();
        assert_eq!(&frame[..], &[0x02, 0x02, 0x01]);
    }

    #[test]
    fn test_encode_init_defaults() {
        let frame = Command::Init {
            access_addr: crate::DEFAULT_ACCESS_ADDR,
            interval_min_ms: crate::DEFAULT_INTERVAL_MIN_MS,
            channel: crate::DEFAULT_CHANNEL,
        }
        .encode()
        .unwrap();
        assert_eq!(
            &frame[..],
            &[0x0A, 0x70, 0xD6, 0xBE, 0x89, 0x8E, 0x64, 0x00, 0x00, 0x00, 0x26]
        );
    }

    #[test]
    fn test_encode_one_byte_commands() {
        assert_eq!(&Command::Start.encode().unwrap()[..], &[0x01, 0x74]);
        assert_eq!(&Command::Stop.encode().unwrap()[..], &[0x01, 0x75]);
        assert_eq!(&Command::RadioReset.encode().unwrap()[..], &[0x01, 0x0E]);
        assert_eq!(
            &Command::BuildVersionGet.encode().unwrap()[..],
            &[0x01, 0x7B]
        );
        assert_eq!(&Command::AccessAddrGet.encode().unwrap()[..], &[0x01, 0x7C]);
        assert_eq!(&Command::ChannelGet.encode().unwrap()[..], &[0x01, 0x7D]);
        assert_eq!(
            &Command::IntervalMinGet.encode().unwrap()[..],
            &[0x01, 0x7F]
        );
    }

    #[test]
    fn test_encode_value_set_reverses_data() {
        let frame = Command::ValueSet {
            handle: 0x0201,
            data: vec![0x0A, 0x0B, 0x0C],
        }
        .encode()
        .unwrap();
        assert_eq!(&frame[..], &[0x06, 0x71, 0x01, 0x02, 0x0C, 0x0B, 0x0A]);
    }

    #[test]
    fn test_encode_value_get() {
        let frame = Command::ValueGet { handle: 1 }.encode().unwrap();
        assert_eq!(&frame[..], &[0x03, 0x7A, 0x01, 0x00]);
    }

    #[test]
    fn test_encode_flag_commands() {
        let set = Command::FlagSet {
            handle: 1,
            flag: Flag::Persistence,
            value: true,
        }
        .encode()
        .unwrap();
        assert_eq!(&set[..], &[0x05, 0x76, 0x01, 0x00, 0x00, 0x01]);

        let get = Command::FlagGet {
            handle: 1,
            flag: Flag::TxEvent,
        }
        .encode()
        .unwrap();
        assert_eq!(&get[..], &[0x04, 0x77, 0x01, 0x00, 0x01]);
    }

    #[test]
    fn test_encode_raw_passthrough() {
        let frame = Command::Raw {
            opcode: 0x7E,
            payload: vec![0xAA, 0xBB],
        }
        .encode()
        .unwrap();
        assert_eq!(&frame[..], &[0x03, 0x7E, 0xAA, 0xBB]);
    }

    #[test]
    fn test_encode_echo_too_long() {
        let result = Command::Echo(vec![0x00; 300]).encode();
        assert!(matches!(
            result,
            Err(ProtocolError::PayloadTooLong { len: 300, .. })
        ));
    }

    #[test]
    fn test_flag_index_round_trip() {
        assert_eq!(Flag::from_index(Flag::Persistence.index()), Some(Flag::Persistence));
        assert_eq!(Flag::from_index(Flag::TxEvent.index()), Some(Flag::TxEvent));
        assert_eq!(Flag::from_index(7), None);
    }

    #[test]
    fn test_stages_echo_prefix() {
        let stages = Command::Echo(vec![0x01]).response_stages();
        assert_eq!(stages.len(), 1);
        assert_eq!(stages[0].expected_bytes(), &[0x02, 0x82]);

        let frame = Frame::build(0x82, &[0x01]).unwrap();
        assert_eq!(
            stages[0].check(&frame),
            PrefixCheck::Match { payload_start: 2 }
        );
    }

    #[test]
    fn test_stages_fixed_reply_success() {
        let stages = Command::Start.response_stages();
        assert_eq!(stages.len(), 1);
        assert_eq!(stages[0].expected_bytes(), &[0x03, 0x84, 0x74, 0x00]);

        let frame = Frame::build(0x84, &[0x74, 0x00]).unwrap();
        assert_eq!(
            stages[0].check(&frame),
            PrefixCheck::Match { payload_start: 4 }
        );
    }

    #[test]
    fn test_stages_fixed_reply_error_status() {
        // An error reply differs from the expectation only at the status
        // byte and must resolve as a device status, not a mismatch.
        let stages = Command::Init {
            access_addr: crate::DEFAULT_ACCESS_ADDR,
            interval_min_ms: 100,
            channel: 38,
        }
        .response_stages();
        let frame = Frame::build(0x84, &[0x70, 0x85]).unwrap();
        assert_eq!(stages[0].check(&frame), PrefixCheck::Status(0x85));
    }

    #[test]
    fn test_stages_fixed_reply_wrong_opcode() {
        let stages = Command::Start.response_stages();
        let frame = Frame::build(0x84, &[0x75, 0x00]).unwrap();
        assert_eq!(stages[0].check(&frame), PrefixCheck::Mismatch);
    }

    #[test]
    fn test_stages_variable_reply_ignores_length() {
        let stages = Command::ValueGet { handle: 1 }.response_stages();
        assert_eq!(stages.len(), 1);

        // Five data bytes this time; the length byte cannot be known when
        // the command is issued.
        let frame = Frame::build(0x84, &[0x7A, 0x00, 0x01, 0x00, 0x05, 0x04, 0x03, 0x02, 0x01])
            .unwrap();
        assert_eq!(
            stages[0].check(&frame),
            PrefixCheck::Match { payload_start: 4 }
        );
    }

    #[test]
    fn test_stages_variable_reply_error_status() {
        let stages = Command::ValueGet { handle: 1 }.response_stages();
        let frame = Frame::build(0x84, &[0x7A, 0x83]).unwrap();
        assert_eq!(stages[0].check(&frame), PrefixCheck::Status(0x83));
    }

    #[test]
    fn test_stages_radio_reset() {
        let stages = Command::RadioReset.response_stages();
        assert_eq!(stages.len(), 2);
        assert!(!stages[0].is_event_completion());
        assert!(stages[1].is_event_completion());

        let ack = Frame::from_bytes(bytes::Bytes::from_static(&[0x00])).unwrap();
        assert_eq!(stages[0].check(&ack), PrefixCheck::Match { payload_start: 1 });

        let started = Frame::build(0x81, &[0x00, 0x00, 0x17]).unwrap();
        assert_eq!(
            stages[1].check(&started),
            PrefixCheck::Match { payload_start: 2 }
        );
    }

    #[test]
    fn test_prefix_check_short_frame_is_mismatch() {
        let stages = Command::ValueGet { handle: 1 }.response_stages();
        let ack = Frame::from_bytes(bytes::Bytes::from_static(&[0x00])).unwrap();
        assert_eq!(stages[0].check(&ack), PrefixCheck::Mismatch);
    }
}
