//! Command execution.

use crate::Commands;
use colored::Colorize;
use meshserial_host::MeshDevice;
use meshserial_protocol::CommandReply;

/// Executes a command and returns the formatted output.
pub async fn execute(device: &MeshDevice, cmd: Commands) -> Result<String, Box<dyn std::error::Error>> {
    match cmd {
        // Listen is handled directly in main.rs (it streams events)
        Commands::Listen { .. } => unreachable!(),

        Commands::Echo { data } => {
            let payload = parse_hex_arg(&data)?;
            let echoed = device.echo(&payload).await?;
            Ok(format!("{} {}", "Echoed".green(), hex::encode(&echoed)))
        }

        Commands::Init {
            access_addr,
            interval_min,
            channel,
        } => {
            let access_addr = parse_u32_arg(&access_addr)?;
            device.init(access_addr, interval_min, channel).await?;
            Ok(format!(
                "{} radio (access addr {:#010X}, interval {} ms, channel {})",
                "Initialized".green(),
                access_addr,
                interval_min,
                channel
            ))
        }

        Commands::Start => {
            device.start().await?;
            Ok(format!("{} broadcasting", "Started".green()))
        }

        Commands::Stop => {
            device.stop().await?;
            Ok(format!("{} broadcasting", "Stopped".green()))
        }

        Commands::ValueSet { handle, data } => {
            let data = parse_hex_arg(&data)?;
            device.value_set(handle, &data).await?;
            Ok(format!(
                "{} handle {} ({} bytes)",
                "Set".green(),
                handle.to_string().cyan(),
                data.len()
            ))
        }

        Commands::ValueGet { handle } => {
            let report = device.value_get(handle).await?;
            if report.data.is_empty() {
                Ok(format!(
                    "handle {}: {}",
                    report.handle.to_string().cyan(),
                    "(empty)".dimmed()
                ))
            } else {
                Ok(format!(
                    "handle {}: {}",
                    report.handle.to_string().cyan(),
                    hex::encode(&report.data)
                ))
            }
        }

        Commands::ValueEnable { handle } => {
            device.value_enable(handle).await?;
            Ok(format!(
                "{} handle {}",
                "Enabled".green(),
                handle.to_string().cyan()
            ))
        }

        Commands::ValueDisable { handle } => {
            device.value_disable(handle).await?;
            Ok(format!(
                "{} handle {}",
                "Disabled".green(),
                handle.to_string().cyan()
            ))
        }

        Commands::FlagSet {
            handle,
            flag,
            value,
        } => {
            device.flag_set(handle, flag.into(), value).await?;
            Ok(format!(
                "{} {} = {} on handle {}",
                "Set".green(),
                flag.label(),
                value,
                handle.to_string().cyan()
            ))
        }

        Commands::FlagGet { handle, flag } => {
            let state = device.flag_get(handle, flag.into()).await?;
            Ok(format!(
                "handle {}: {} = {}",
                state.handle.to_string().cyan(),
                flag.label(),
                state.value
            ))
        }

        Commands::Dfu { data } => {
            let packet = parse_hex_arg(&data)?;
            let ack = device.dfu_data(&packet).await?;
            if ack.is_empty() {
                Ok(format!("{} DFU packet", "Relayed".green()))
            } else {
                Ok(format!(
                    "{} DFU packet (ack: {})",
                    "Relayed".green(),
                    hex::encode(&ack)
                ))
            }
        }

        Commands::Version => {
            let version = device.build_version().await?;
            Ok(format!("build version {}", version.to_string().cyan()))
        }

        Commands::AccessAddr => {
            let addr = device.access_addr().await?;
            Ok(format!("{:#010X}", addr))
        }

        Commands::Channel => {
            let channel = device.channel().await?;
            Ok(format!("{}", channel))
        }

        Commands::IntervalMin => {
            let interval = device.interval_min().await?;
            Ok(format!("{} ms", interval))
        }

        Commands::Reset => {
            let started = device.radio_reset().await?;
            Ok(format!(
                "{} device (operating mode {}, hw error {}, data credits {})",
                "Restarted".green(),
                started.operating_mode,
                started.hw_error,
                started.data_credit_available
            ))
        }

        Commands::Raw { opcode, payload } => {
            let opcode = parse_u8_arg(&opcode)?;
            let payload = parse_hex_arg(&payload)?;
            let reply = device.raw(opcode, &payload).await?;
            Ok(format_reply(&reply))
        }
    }
}

/// Formats a decoded reply for display.
fn format_reply(reply: &CommandReply) -> String {
    match reply {
        CommandReply::Done => "OK".green().to_string(),
        CommandReply::Echo(data) => format!("{} {}", "Echoed".green(), hex::encode(data)),
        CommandReply::Value(report) => format!(
            "handle {}: {}",
            report.handle.to_string().cyan(),
            hex::encode(&report.data)
        ),
        CommandReply::Flag(state) => format!(
            "handle {}: flag {} = {}",
            state.handle.to_string().cyan(),
            state.flag_index,
            state.value
        ),
        CommandReply::Version(version) => format!("build version {}", version),
        CommandReply::AccessAddr(addr) => format!("{:#010X}", addr),
        CommandReply::Channel(channel) => format!("{}", channel),
        CommandReply::IntervalMin(interval) => format!("{} ms", interval),
        CommandReply::Dfu(data) => format!("{} {}", "DFU ack".green(), hex::encode(data)),
        CommandReply::Raw { opcode, data } => {
            format!("opcode {:#04X}: {}", opcode, hex::encode(data))
        }
    }
}

/// Parses a hex byte-string argument (with or without 0x prefix).
fn parse_hex_arg(arg: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let arg = arg.strip_prefix("0x").unwrap_or(arg);
    if arg.is_empty() {
        return Ok(Vec::new());
    }
    Ok(hex::decode(arg)?)
}

/// Parses a u32 argument as hex (0x prefix) or decimal.
fn parse_u32_arg(arg: &str) -> Result<u32, Box<dyn std::error::Error>> {
    if let Some(hex) = arg.strip_prefix("0x") {
        Ok(u32::from_str_radix(hex, 16)?)
    } else {
        Ok(arg.parse()?)
    }
}

/// Parses a u8 argument as hex (0x prefix) or decimal.
fn parse_u8_arg(arg: &str) -> Result<u8, Box<dyn std::error::Error>> {
    if let Some(hex) = arg.strip_prefix("0x") {
        Ok(u8::from_str_radix(hex, 16)?)
    } else {
        Ok(arg.parse()?)
    }
}
