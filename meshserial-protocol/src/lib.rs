//! # meshserial-protocol
//!
//! Wire protocol for the OpenMesh serial interface.
//!
//! This crate provides:
//! - Length-prefixed framing and incremental stream reassembly
//! - Command response / event classification
//! - Typed command encoding with per-command response expectations
//! - Typed reply and event decoding, including the wire reversal of
//!   mesh value bytes
//! - Device status codes
//!
//! Everything here is transport-agnostic and synchronous; the async
//! correlation engine lives in `meshserial-host`.

pub mod codec;
pub mod command;
pub mod error;
pub mod event;
pub mod frame;
pub mod opcode;
pub mod response;

pub use codec::{Classifier, FrameKind, Reassembler};
pub use command::{Command, Flag, PrefixCheck, ResponsePrefix};
pub use error::{ProtocolError, StatusCode};
pub use event::{Event, StartedReport};
pub use frame::Frame;
pub use response::{BuildVersion, CommandReply, FlagState, ValueReport};

/// Maximum value of the length byte.
pub const MAX_LENGTH_BYTE: u8 = 254;

/// Maximum payload size (the length byte covers opcode plus payload).
pub const MAX_PAYLOAD_LEN: usize = 253;

/// Default mesh access address.
pub const DEFAULT_ACCESS_ADDR: u32 = 0x8E89_BED6;

/// Default minimum rebroadcast interval in milliseconds.
pub const DEFAULT_INTERVAL_MIN_MS: u32 = 100;

/// Default advertising channel.
pub const DEFAULT_CHANNEL: u8 = 38;
