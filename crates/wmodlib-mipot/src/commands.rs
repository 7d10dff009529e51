//! Mipot command builders, reply parsers and status codes.
//!
//! Builders validate their arguments and produce a [`Command`] without any
//! I/O, so invalid input is rejected before the module is even woken.
//! Parsers take the payload of a reply frame and never panic on short or
//! malformed input.

use std::fmt;
use std::time::Duration;

use wmodlib_core::{Error, Result};

use crate::frame::encode_frame;

// ---------------------------------------------------------------
// Command codes
// ---------------------------------------------------------------

/// Module reset.
pub const CMD_RESET: u8 = 0x30;
/// Write bytes to EEPROM.
pub const CMD_EEPROM_WRITE: u8 = 0x32;
/// Read bytes from EEPROM.
pub const CMD_EEPROM_READ: u8 = 0x33;
/// Firmware version, 4-byte little-endian reply.
pub const CMD_GET_FW_VERSION: u8 = 0x34;
/// Serial number, 4-byte little-endian reply.
pub const CMD_GET_SERIAL_NO: u8 = 0x35;
/// Device EUI, 8 bytes, least significant first.
pub const CMD_GET_DEV_EUI: u8 = 0x36;
/// Start a network join.
pub const CMD_JOIN: u8 = 0x40;
/// Activation status query.
pub const CMD_GET_ACTIVATION_STATUS: u8 = 0x42;
/// Store the OTAA application key.
pub const CMD_SET_APP_KEY: u8 = 0x43;
/// Send an uplink.
pub const CMD_TX_MSG: u8 = 0x46;
/// Configure one channel of the channel plan.
pub const CMD_SET_CH_PARAMETERS: u8 = 0x57;

// ---------------------------------------------------------------
// Reply timeouts
// ---------------------------------------------------------------

/// Reply timeout for queries, join, activation status and transmit.
pub const TIMEOUT_DEFAULT: Duration = Duration::from_millis(250);
/// Reply timeout for channel configuration.
pub const TIMEOUT_CH_PARAMETERS: Duration = Duration::from_millis(550);
/// Reply timeout for EEPROM access.
pub const TIMEOUT_EEPROM: Duration = Duration::from_secs(1);
/// Reply timeout for storing the application key.
pub const TIMEOUT_APP_KEY: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------
// Argument limits
// ---------------------------------------------------------------

/// Lowest LoRaWAN application port.
pub const FPORT_MIN: u8 = 1;
/// Highest LoRaWAN application port.
pub const FPORT_MAX: u8 = 223;
/// Largest uplink payload the module accepts.
pub const TX_MAX_DATA: usize = 209;
/// Lowest configurable channel index. Channels 0-2 are fixed by the band.
pub const CHANNEL_MIN: u8 = 3;
/// Highest configurable channel index.
pub const CHANNEL_MAX: u8 = 15;
/// Lower edge of the permitted band in Hz.
pub const BAND_MIN_HZ: u32 = 863_000_000;
/// Upper edge of the permitted band in Hz.
pub const BAND_MAX_HZ: u32 = 869_000_000;
/// Highest data rate index.
pub const DATA_RATE_MAX: u8 = 7;

/// An outbound command before framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Command code (reply bit clear).
    pub code: u8,
    /// Payload bytes following the length byte.
    pub payload: Vec<u8>,
}

impl Command {
    pub fn new(code: u8, payload: Vec<u8>) -> Self {
        Command { code, payload }
    }

    /// Frame this command for the wire.
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode_frame(self.code, &self.payload)
    }
}

fn invalid(msg: impl Into<String>) -> Error {
    Error::InvalidArgument(msg.into())
}

// ---------------------------------------------------------------
// Command builders
// ---------------------------------------------------------------

/// Build a "get firmware version" command.
pub fn cmd_get_fw_version() -> Command {
    Command::new(CMD_GET_FW_VERSION, Vec::new())
}

/// Build a "get serial number" command.
pub fn cmd_get_serial_no() -> Command {
    Command::new(CMD_GET_SERIAL_NO, Vec::new())
}

/// Build a "get device EUI" command.
pub fn cmd_get_deveui() -> Command {
    Command::new(CMD_GET_DEV_EUI, Vec::new())
}

/// Build a "get activation status" command.
pub fn cmd_get_activation_status() -> Command {
    Command::new(CMD_GET_ACTIVATION_STATUS, Vec::new())
}

/// Build a module reset command. The module does not reply.
pub fn cmd_reset() -> Command {
    Command::new(CMD_RESET, Vec::new())
}

/// Build a join command.
pub fn cmd_join(mode: JoinMode) -> Command {
    Command::new(CMD_JOIN, vec![mode as u8])
}

/// Build a "set application key" command.
///
/// The key is given most significant byte first and sent reversed.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] unless `app_key` is exactly 16 bytes.
pub fn cmd_set_app_key(app_key: &[u8]) -> Result<Command> {
    if app_key.len() != 16 {
        return Err(invalid(format!(
            "app key must be exactly 16 bytes, got {}",
            app_key.len()
        )));
    }
    Ok(Command::new(
        CMD_SET_APP_KEY,
        app_key.iter().rev().copied().collect(),
    ))
}

/// Build a transmit command.
///
/// Payload layout: `options | fport | data...`, where bit 0 of `options`
/// requests confirmation.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `fport` is outside 1-223 or
/// `data` is empty or longer than [`TX_MAX_DATA`] bytes.
pub fn cmd_tx_msg(data: &[u8], fport: u8, confirmed: bool) -> Result<Command> {
    if !(FPORT_MIN..=FPORT_MAX).contains(&fport) {
        return Err(invalid(format!("bad fport {fport}, must be 1-223")));
    }
    if data.is_empty() {
        return Err(invalid("nothing to transmit"));
    }
    if data.len() > TX_MAX_DATA {
        return Err(invalid(format!(
            "data length {} too big, max {TX_MAX_DATA}",
            data.len()
        )));
    }

    let mut payload = Vec::with_capacity(data.len() + 2);
    payload.push(u8::from(confirmed));
    payload.push(fport);
    payload.extend_from_slice(data);
    Ok(Command::new(CMD_TX_MSG, payload))
}

/// Build an EEPROM write command.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `data` is longer than 0xFE bytes
/// or the write would run past address 0xFE.
pub fn cmd_eeprom_write(start: u8, data: &[u8]) -> Result<Command> {
    if data.len() > 0xFE {
        return Err(invalid(format!("EEPROM data too long: {} bytes", data.len())));
    }
    if start as usize + data.len() > 0xFF {
        return Err(invalid(format!(
            "{} bytes do not fit at EEPROM address 0x{start:02X}",
            data.len()
        )));
    }

    let mut payload = Vec::with_capacity(data.len() + 1);
    payload.push(start);
    payload.extend_from_slice(data);
    Ok(Command::new(CMD_EEPROM_WRITE, payload))
}

/// Build an EEPROM read command.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if the read would run past the
/// 256-byte EEPROM.
pub fn cmd_eeprom_read(start: u8, len: u8) -> Result<Command> {
    if start as usize + len as usize > 0x100 {
        return Err(invalid(format!(
            "cannot read {len} bytes from EEPROM address 0x{start:02X}"
        )));
    }
    Ok(Command::new(CMD_EEPROM_READ, vec![start, len]))
}

/// Build a "set channel parameters" command.
///
/// `frequency_hz` is the channel center frequency. The data rate range
/// determines the channel bandwidth: 125 kHz for DR0-DR5, 250 kHz for DR6
/// and 50 kHz for DR7 (FSK); a maximum of DR6 widens the channel to
/// 250 kHz. The whole channel must fit in 863-869 MHz.
///
/// Payload layout: `channel | frequency (u32 LE) | min_dr | max_dr << 4 | enabled`.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] for a channel outside 3-15, an
/// invalid data rate range, or a channel that leaves the band.
pub fn cmd_set_ch_parameters(
    channel: u8,
    frequency_hz: u32,
    min_data_rate: u8,
    max_data_rate: u8,
    enabled: bool,
) -> Result<Command> {
    if !(CHANNEL_MIN..=CHANNEL_MAX).contains(&channel) {
        return Err(invalid(format!("bad channel {channel}, must be 3-15")));
    }
    if min_data_rate > max_data_rate {
        return Err(invalid(format!(
            "minimum data rate {min_data_rate} higher than maximum {max_data_rate}"
        )));
    }
    let mut bandwidth_hz = match min_data_rate {
        0..=5 => 125_000,
        6 => 250_000,
        7 => 50_000,
        _ => return Err(invalid(format!("bad minimum data rate {min_data_rate}"))),
    };
    if max_data_rate > DATA_RATE_MAX {
        return Err(invalid(format!("bad maximum data rate {max_data_rate}")));
    }
    if max_data_rate == 6 && bandwidth_hz < 250_000 {
        bandwidth_hz = 250_000;
    }

    let half = bandwidth_hz / 2;
    if frequency_hz.saturating_sub(half) < BAND_MIN_HZ {
        return Err(invalid(format!("frequency {frequency_hz} Hz too low")));
    }
    if frequency_hz.saturating_add(half) > BAND_MAX_HZ {
        return Err(invalid(format!("frequency {frequency_hz} Hz too high")));
    }

    let mut payload = Vec::with_capacity(7);
    payload.push(channel);
    payload.extend_from_slice(&frequency_hz.to_le_bytes());
    payload.push(min_data_rate | (max_data_rate << 4));
    payload.push(u8::from(enabled));
    Ok(Command::new(CMD_SET_CH_PARAMETERS, payload))
}

// ---------------------------------------------------------------
// Reply parsers
// ---------------------------------------------------------------

/// Parse the status byte at offset 0 of a reply payload.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the payload is empty.
pub fn parse_status(payload: &[u8]) -> Result<u8> {
    payload
        .first()
        .copied()
        .ok_or_else(|| Error::Protocol("expected a status byte, got an empty reply".into()))
}

/// Parse a 4-byte little-endian unsigned integer reply.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the payload is shorter than 4 bytes.
pub fn parse_u32_le(payload: &[u8]) -> Result<u32> {
    let bytes: [u8; 4] = payload
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| {
            Error::Protocol(format!("expected 4 bytes, got {}", payload.len()))
        })?;
    Ok(u32::from_le_bytes(bytes))
}

/// Parse an 8-byte EUI sent least significant byte first.
///
/// Returns the EUI in its natural, most significant first, order.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the payload is shorter than 8 bytes.
pub fn parse_eui(payload: &[u8]) -> Result<[u8; 8]> {
    let mut eui: [u8; 8] = payload
        .get(..8)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| {
            Error::Protocol(format!("expected 8 EUI bytes, got {}", payload.len()))
        })?;
    eui.reverse();
    Ok(eui)
}

/// Parse an EEPROM read reply of `len` requested bytes.
///
/// Returns `None` unless the reply is exactly `len + 1` bytes long and its
/// status byte signals success.
pub fn parse_eeprom_read(payload: &[u8], len: u8) -> Option<Vec<u8>> {
    match payload.split_first() {
        Some((&0x00, data)) if data.len() == len as usize => Some(data.to_vec()),
        _ => None,
    }
}

// ---------------------------------------------------------------
// Status codes
// ---------------------------------------------------------------

/// Join procedure selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum JoinMode {
    /// Activation by personalization.
    Abp = 0,
    /// Over-the-air activation.
    Otaa = 1,
}

/// Status of a join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStatus {
    Success,
    InvalidParameter,
    Busy,
    Other(u8),
}

impl From<u8> for JoinStatus {
    fn from(value: u8) -> Self {
        match value {
            0 => JoinStatus::Success,
            1 => JoinStatus::InvalidParameter,
            2 => JoinStatus::Busy,
            other => JoinStatus::Other(other),
        }
    }
}

/// Network activation state of the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationStatus {
    NotActivated,
    Joining,
    Joined,
    MacError,
    Other(u8),
}

impl From<u8> for ActivationStatus {
    fn from(value: u8) -> Self {
        match value {
            0 => ActivationStatus::NotActivated,
            1 => ActivationStatus::Joining,
            2 => ActivationStatus::Joined,
            3 => ActivationStatus::MacError,
            other => ActivationStatus::Other(other),
        }
    }
}

/// Status of a transmit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Success,
    Busy,
    NotActivated,
    /// Duty cycle restriction on every eligible channel.
    ChannelBlocked,
    PortNotSupported,
    LengthNotSupported,
    /// The end node is in silent state.
    Silent,
    Error,
    Other(u8),
}

impl From<u8> for TxStatus {
    fn from(value: u8) -> Self {
        match value {
            0 => TxStatus::Success,
            1 => TxStatus::Busy,
            2 => TxStatus::NotActivated,
            3 => TxStatus::ChannelBlocked,
            4 => TxStatus::PortNotSupported,
            5 => TxStatus::LengthNotSupported,
            6 => TxStatus::Silent,
            7 => TxStatus::Error,
            other => TxStatus::Other(other),
        }
    }
}

/// Status of a channel configuration request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Success,
    ChannelOutOfRange,
    DataRateOutOfRange,
    DataRateAndFrequencyOutOfRange,
    MacBusy,
    Other(u8),
}

impl From<u8> for ChannelStatus {
    fn from(value: u8) -> Self {
        match value {
            0x00 => ChannelStatus::Success,
            0xF1 => ChannelStatus::ChannelOutOfRange,
            0xF2 => ChannelStatus::DataRateOutOfRange,
            0xF3 => ChannelStatus::DataRateAndFrequencyOutOfRange,
            0xF4 => ChannelStatus::MacBusy,
            other => ChannelStatus::Other(other),
        }
    }
}

impl fmt::Display for JoinStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinStatus::Success => write!(f, "success"),
            JoinStatus::InvalidParameter => write!(f, "invalid parameter"),
            JoinStatus::Busy => write!(f, "busy"),
            JoinStatus::Other(v) => write!(f, "unknown status 0x{v:02X}"),
        }
    }
}

impl fmt::Display for ActivationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivationStatus::NotActivated => write!(f, "not activated"),
            ActivationStatus::Joining => write!(f, "joining"),
            ActivationStatus::Joined => write!(f, "joined"),
            ActivationStatus::MacError => write!(f, "MAC error"),
            ActivationStatus::Other(v) => write!(f, "unknown status 0x{v:02X}"),
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxStatus::Success => write!(f, "success"),
            TxStatus::Busy => write!(f, "device busy"),
            TxStatus::NotActivated => write!(f, "device not activated"),
            TxStatus::ChannelBlocked => write!(f, "channel blocked by duty cycle"),
            TxStatus::PortNotSupported => write!(f, "port number not supported"),
            TxStatus::LengthNotSupported => write!(f, "length not supported"),
            TxStatus::Silent => write!(f, "end node in silent state"),
            TxStatus::Error => write!(f, "error"),
            TxStatus::Other(v) => write!(f, "unknown status 0x{v:02X}"),
        }
    }
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelStatus::Success => write!(f, "success"),
            ChannelStatus::ChannelOutOfRange => write!(f, "channel out of range"),
            ChannelStatus::DataRateOutOfRange => write!(f, "data rate out of range"),
            ChannelStatus::DataRateAndFrequencyOutOfRange => {
                write!(f, "data rate and frequency out of range")
            }
            ChannelStatus::MacBusy => write!(f, "MAC busy"),
            ChannelStatus::Other(v) => write!(f, "unknown status 0x{v:02X}"),
        }
    }
}
