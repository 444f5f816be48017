//! Opcode tables for the OpenMesh serial interface.
//!
//! Opcodes below `0x80` are host-to-device commands; `0x80` and above are
//! device-to-host. The DFU opcode is shared: the host pushes DFU packets
//! with it and the device reports DFU traffic with it.

/// Commands issued by the host.
pub mod cmd {
    pub const ECHO: u8 = 0x02;
    pub const RADIO_RESET: u8 = 0x0E;
    pub const INIT: u8 = 0x70;
    pub const VALUE_SET: u8 = 0x71;
    pub const VALUE_ENABLE: u8 = 0x72;
    pub const VALUE_DISABLE: u8 = 0x73;
    pub const START: u8 = 0x74;
    pub const STOP: u8 = 0x75;
    pub const FLAG_SET: u8 = 0x76;
    pub const FLAG_GET: u8 = 0x77;
    pub const DFU_DATA: u8 = 0x78;
    pub const VALUE_GET: u8 = 0x7A;
    pub const BUILD_VERSION_GET: u8 = 0x7B;
    pub const ACCESS_ADDR_GET: u8 = 0x7C;
    pub const CHANNEL_GET: u8 = 0x7D;
    pub const INTERVAL_MIN_GET: u8 = 0x7F;
}

/// Frames sent by the device.
pub mod rsp {
    pub const DEVICE_STARTED: u8 = 0x81;
    pub const ECHO_RSP: u8 = 0x82;
    pub const CMD_RSP: u8 = 0x84;
    pub const EVENT_NEW: u8 = 0xB3;
    pub const EVENT_UPDATE: u8 = 0xB4;
    pub const EVENT_CONFLICTING: u8 = 0xB5;
    pub const EVENT_TX: u8 = 0xB6;
    /// DFU events reuse the DFU data opcode.
    pub const EVENT_DFU: u8 = 0x78;
}
