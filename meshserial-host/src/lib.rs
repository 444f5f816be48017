//! # meshserial-host
//!
//! Async host-side engine for the OpenMesh serial interface.
//!
//! This crate provides:
//! - [`Connection`]: transport attachment, FIFO command correlation,
//!   per-stage timeouts and event fan-out
//! - [`MeshDevice`]: a typed method per device command
//! - [`Transport`]: the seam between the engine and whatever byte stream
//!   carries the protocol
//!
//! The wire format itself lives in `meshserial-protocol`.

pub mod connection;
pub mod device;
pub mod error;
pub mod transport;

pub use connection::{
    Connection, ConnectionConfig, StageReply, DEFAULT_COMMAND_TIMEOUT, DEFAULT_READ_BUFFER_SIZE,
    MAX_READ_BUFFER_SIZE, MIN_READ_BUFFER_SIZE,
};
pub use device::MeshDevice;
pub use error::HostError;
pub use transport::{BoxedTransport, Transport};
