//! Known EEPROM locations and their value types.

use std::fmt;

/// Join EUI, 8 bytes, least significant first.
pub const ADDR_JOIN_EUI: u8 = 0x08;
/// LoRaWAN device class.
pub const ADDR_CLASS: u8 = 0x20;
/// Adaptive data rate enable flag.
pub const ADDR_ADR: u8 = 0x23;
/// Number of repetitions of unconfirmed uplinks.
pub const ADDR_UNCONFIRMED_REPEAT: u8 = 0x25;
/// Public or private network selector.
pub const ADDR_NETWORK_TYPE: u8 = 0x2E;

/// LoRaWAN device class stored at [`ADDR_CLASS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoRaWanClass {
    A,
    C,
    Other(u8),
}

impl From<u8> for LoRaWanClass {
    fn from(value: u8) -> Self {
        match value {
            0 => LoRaWanClass::A,
            1 => LoRaWanClass::C,
            other => LoRaWanClass::Other(other),
        }
    }
}

impl fmt::Display for LoRaWanClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoRaWanClass::A => write!(f, "A"),
            LoRaWanClass::C => write!(f, "C"),
            LoRaWanClass::Other(v) => write!(f, "unknown (0x{v:02X})"),
        }
    }
}

/// Network type stored at [`ADDR_NETWORK_TYPE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkType {
    Private,
    Public,
    Other(u8),
}

impl From<u8> for NetworkType {
    fn from(value: u8) -> Self {
        match value {
            0 => NetworkType::Private,
            1 => NetworkType::Public,
            other => NetworkType::Other(other),
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkType::Private => write!(f, "private"),
            NetworkType::Public => write!(f, "public"),
            NetworkType::Other(v) => write!(f, "unknown (0x{v:02X})"),
        }
    }
}
