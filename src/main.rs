//! meshserial - Command-line tool for OpenMesh serial devices
//!
//! Connects to a device through a serial-to-TCP bridge and provides
//! one-shot commands plus an event listener mode.

mod commands;

use std::net::SocketAddr;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tokio::net::TcpStream;
use tracing_subscriber::EnvFilter;

use meshserial_host::{ConnectionConfig, MeshDevice};
use meshserial_protocol::Flag;

#[derive(Parser)]
#[command(name = "meshserial")]
#[command(about = "Command-line tool for OpenMesh serial devices")]
#[command(version)]
struct Cli {
    /// Device bridge address (serial-to-TCP)
    #[arg(short, long, default_value = "127.0.0.1:7411", env = "MESHSERIAL_DEVICE")]
    device: SocketAddr,

    /// Per-stage response timeout in milliseconds
    #[arg(long, default_value_t = 5000, env = "MESHSERIAL_TIMEOUT_MS")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Per-handle flag names on the command line.
#[derive(Clone, Copy, ValueEnum)]
enum FlagArg {
    Persistence,
    TxEvent,
}

impl From<FlagArg> for Flag {
    fn from(arg: FlagArg) -> Self {
        match arg {
            FlagArg::Persistence => Flag::Persistence,
            FlagArg::TxEvent => Flag::TxEvent,
        }
    }
}

impl FlagArg {
    fn label(self) -> &'static str {
        match self {
            FlagArg::Persistence => "persistence",
            FlagArg::TxEvent => "tx-event",
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print device events as JSON lines until interrupted
    Listen {
        /// Initialize the radio and start broadcasting first
        #[arg(long)]
        init: bool,
    },

    /// Send bytes the device echoes back (hex)
    Echo {
        /// Payload bytes, e.g. 0a0b0c
        data: String,
    },

    /// Configure the radio
    Init {
        /// Access address (hex or decimal)
        #[arg(long, default_value = "0x8E89BED6")]
        access_addr: String,

        /// Minimum rebroadcast interval in milliseconds
        #[arg(long, default_value_t = 100)]
        interval_min: u32,

        /// Advertising channel
        #[arg(long, default_value_t = 38)]
        channel: u8,
    },

    /// Start broadcasting
    Start,

    /// Stop broadcasting
    Stop,

    /// Publish a value for a handle
    ValueSet {
        /// Handle number
        handle: u16,

        /// Value bytes, e.g. 0a0b0c
        data: String,
    },

    /// Read a handle's value
    ValueGet {
        /// Handle number
        handle: u16,
    },

    /// Re-enable rebroadcast of a handle
    ValueEnable {
        /// Handle number
        handle: u16,
    },

    /// Stop rebroadcasting a handle
    ValueDisable {
        /// Handle number
        handle: u16,
    },

    /// Set a per-handle flag
    FlagSet {
        /// Handle number
        handle: u16,

        /// Flag to set
        #[arg(value_enum)]
        flag: FlagArg,

        /// New value
        #[arg(action = clap::ArgAction::Set)]
        value: bool,
    },

    /// Read a per-handle flag
    FlagGet {
        /// Handle number
        handle: u16,

        /// Flag to read
        #[arg(value_enum)]
        flag: FlagArg,
    },

    /// Push one DFU packet (hex)
    Dfu {
        /// Packet bytes
        data: String,
    },

    /// Read the firmware build version
    Version,

    /// Read the configured access address
    AccessAddr,

    /// Read the configured advertising channel
    Channel,

    /// Read the configured minimum rebroadcast interval
    IntervalMin,

    /// Reset the radio and wait for the device to start
    Reset,

    /// Issue an arbitrary command opcode with a hex payload
    Raw {
        /// Opcode (hex or decimal)
        opcode: String,

        /// Payload bytes (hex)
        #[arg(default_value = "")]
        payload: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let device = connect(&cli).await.map_err(|e| {
        eprintln!("{}: {}", "Connection failed".red(), e);
        e
    })?;

    match cli.command {
        Some(Commands::Listen { init }) => {
            listen(&device, init).await?;
            device.close().await?;
        }
        None => {
            listen(&device, false).await?;
            device.close().await?;
        }
        Some(cmd) => {
            let result = commands::execute(&device, cmd).await;

            match result {
                Ok(output) => {
                    println!("{}", output);
                }
                Err(e) => {
                    eprintln!("{}: {}", "Error".red(), e);
                    std::process::exit(1);
                }
            }

            device.close().await?;
        }
    }

    Ok(())
}

/// Connects to the bridge and attaches the engine.
async fn connect(cli: &Cli) -> Result<MeshDevice, Box<dyn std::error::Error>> {
    tracing::debug!("connecting to {}", cli.device);
    let stream = tokio::time::timeout(Duration::from_secs(10), TcpStream::connect(cli.device))
        .await
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out"))??;
    stream.set_nodelay(true).ok();

    let config =
        ConnectionConfig::new().with_command_timeout(Duration::from_millis(cli.timeout_ms));
    Ok(MeshDevice::attach(stream, config).await)
}

/// Streams events as JSON lines until Ctrl+C.
async fn listen(device: &MeshDevice, init: bool) -> Result<(), Box<dyn std::error::Error>> {
    // Subscribe before issuing anything so no event is missed
    let mut event_rx = device.subscribe_events();

    if init {
        device.init_defaults().await?;
        device.start().await?;
        eprintln!("{} radio with defaults", "Initialized".green());
    }

    eprintln!("{} for device events...", "Listening".green());
    eprintln!("{}", "Press Ctrl+C to stop...".dimmed());

    loop {
        tokio::select! {
            event = event_rx.recv() => {
                match event {
                    Ok(e) => {
                        let mut value = serde_json::to_value(&e)?;
                        if let serde_json::Value::Object(ref mut map) = value {
                            map.insert(
                                "ts".to_string(),
                                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
                            );
                        }
                        println!("{}", value);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        eprintln!("{}: lagged {} events", "Warning".yellow(), n);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        eprintln!("{}", "Connection closed".red());
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\n{}", "Stopping...".dimmed());
                break;
            }
        }
    }

    Ok(())
}
