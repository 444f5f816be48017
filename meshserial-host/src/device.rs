//! Typed device API.
//!
//! [`MeshDevice`] wraps a [`Connection`] and exposes one method per
//! command, decoding replies into the types from `meshserial-protocol`.

use std::sync::Arc;

use tokio::sync::broadcast;

use meshserial_protocol::opcode::cmd;
use meshserial_protocol::{
    BuildVersion, Command, CommandReply, Event, Flag, FlagState, StartedReport, ValueReport,
    DEFAULT_ACCESS_ADDR, DEFAULT_CHANNEL, DEFAULT_INTERVAL_MIN_MS,
};

use crate::connection::{Connection, ConnectionConfig};
use crate::error::HostError;
use crate::transport::Transport;

/// A mesh device reached over a serial transport.
#[derive(Clone)]
pub struct MeshDevice {
    connection: Arc<Connection>,
}

impl MeshDevice {
    /// Wraps an existing connection.
    pub fn new(connection: Arc<Connection>) -> Self {
        Self { connection }
    }

    /// Attaches to an open transport and starts the engine.
    pub async fn attach<T>(transport: T, config: ConnectionConfig) -> Self
    where
        T: Transport + 'static,
    {
        Self {
            connection: Connection::attach(transport, config).await,
        }
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Subscribes to device events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.connection.subscribe_events()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub async fn close(&self) -> Result<(), HostError> {
        self.connection.close().await
    }

    /// Sends bytes the device echoes back verbatim.
    pub async fn echo(&self, data: &[u8]) -> Result<Vec<u8>, HostError> {
        let reply = self.connection.execute(Command::Echo(data.to_vec())).await?;
        Ok(reply.payload().to_vec())
    }

    /// Resets the radio and waits for the device to report it started.
    pub async fn radio_reset(&self) -> Result<StartedReport, HostError> {
        let reply = self.connection.execute(Command::RadioReset).await?;
        Ok(StartedReport::parse(reply.payload())?)
    }

    /// Configures the radio.
    pub async fn init(
        &self,
        access_addr: u32,
        interval_min_ms: u32,
        channel: u8,
    ) -> Result<(), HostError> {
        self.connection
            .execute(Command::Init {
                access_addr,
                interval_min_ms,
                channel,
            })
            .await?;
        Ok(())
    }

    /// Configures the radio with the standard defaults.
    pub async fn init_defaults(&self) -> Result<(), HostError> {
        self.init(DEFAULT_ACCESS_ADDR, DEFAULT_INTERVAL_MIN_MS, DEFAULT_CHANNEL)
            .await
    }

    /// Begins broadcasting.
    pub async fn start(&self) -> Result<(), HostError> {
        self.connection.execute(Command::Start).await?;
        Ok(())
    }

    /// Stops broadcasting.
    pub async fn stop(&self) -> Result<(), HostError> {
        self.connection.execute(Command::Stop).await?;
        Ok(())
    }

    /// Publishes a new value for a handle.
    pub async fn value_set(&self, handle: u16, data: &[u8]) -> Result<(), HostError> {
        self.connection
            .execute(Command::ValueSet {
                handle,
                data: data.to_vec(),
            })
            .await?;
        Ok(())
    }

    /// Reads a handle's current value.
    pub async fn value_get(&self, handle: u16) -> Result<ValueReport, HostError> {
        let reply = self
            .connection
            .execute(Command::ValueGet { handle })
            .await?;
        match CommandReply::decode(cmd::VALUE_GET, reply.payload())? {
            CommandReply::Value(report) => Ok(report),
            _ => Err(HostError::UnexpectedReply {
                command: "VALUE_GET",
            }),
        }
    }

    /// Re-enables rebroadcast of a handle.
    pub async fn value_enable(&self, handle: u16) -> Result<(), HostError> {
        self.connection
            .execute(Command::ValueEnable { handle })
            .await?;
        Ok(())
    }

    /// Stops rebroadcasting a handle.
    pub async fn value_disable(&self, handle: u16) -> Result<(), HostError> {
        self.connection
            .execute(Command::ValueDisable { handle })
            .await?;
        Ok(())
    }

    /// Sets a per-handle flag.
    pub async fn flag_set(&self, handle: u16, flag: Flag, value: bool) -> Result<(), HostError> {
        self.connection
            .execute(Command::FlagSet {
                handle,
                flag,
                value,
            })
            .await?;
        Ok(())
    }

    /// Reads a per-handle flag.
    pub async fn flag_get(&self, handle: u16, flag: Flag) -> Result<FlagState, HostError> {
        let reply = self
            .connection
            .execute(Command::FlagGet { handle, flag })
            .await?;
        match CommandReply::decode(cmd::FLAG_GET, reply.payload())? {
            CommandReply::Flag(state) => Ok(state),
            _ => Err(HostError::UnexpectedReply {
                command: "FLAG_GET",
            }),
        }
    }

    /// Pushes one DFU packet and returns the acknowledgment payload.
    pub async fn dfu_data(&self, data: &[u8]) -> Result<Vec<u8>, HostError> {
        let reply = self
            .connection
            .execute(Command::DfuData(data.to_vec()))
            .await?;
        Ok(reply.payload().to_vec())
    }

    /// Reads the firmware build version.
    pub async fn build_version(&self) -> Result<BuildVersion, HostError> {
        let reply = self.connection.execute(Command::BuildVersionGet).await?;
        match CommandReply::decode(cmd::BUILD_VERSION_GET, reply.payload())? {
            CommandReply::Version(version) => Ok(version),
            _ => Err(HostError::UnexpectedReply {
                command: "BUILD_VERSION_GET",
            }),
        }
    }

    /// Reads the configured access address.
    pub async fn access_addr(&self) -> Result<u32, HostError> {
        let reply = self.connection.execute(Command::AccessAddrGet).await?;
        match CommandReply::decode(cmd::ACCESS_ADDR_GET, reply.payload())? {
            CommandReply::AccessAddr(addr) => Ok(addr),
            _ => Err(HostError::UnexpectedReply {
                command: "ACCESS_ADDR_GET",
            }),
        }
    }

    /// Reads the configured advertising channel.
    pub async fn channel(&self) -> Result<u8, HostError> {
        let reply = self.connection.execute(Command::ChannelGet).await?;
        match CommandReply::decode(cmd::CHANNEL_GET, reply.payload())? {
            CommandReply::Channel(channel) => Ok(channel),
            _ => Err(HostError::UnexpectedReply {
                command: "CHANNEL_GET",
            }),
        }
    }

    /// Reads the configured minimum rebroadcast interval in milliseconds.
    pub async fn interval_min(&self) -> Result<u32, HostError> {
        let reply = self.connection.execute(Command::IntervalMinGet).await?;
        match CommandReply::decode(cmd::INTERVAL_MIN_GET, reply.payload())? {
            CommandReply::IntervalMin(interval) => Ok(interval),
            _ => Err(HostError::UnexpectedReply {
                command: "INTERVAL_MIN_GET",
            }),
        }
    }

    /// Issues an untyped command and decodes the reply by its opcode.
    ///
    /// The device must answer with a generic command response; opcodes
    /// with their own reply format (echo, radio reset) have typed methods.
    pub async fn raw(&self, opcode: u8, payload: &[u8]) -> Result<CommandReply, HostError> {
        let reply = self
            .connection
            .execute(Command::Raw {
                opcode,
                payload: payload.to_vec(),
            })
            .await?;
        Ok(CommandReply::decode(opcode, reply.payload())?)
    }
}
