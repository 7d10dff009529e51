//! Mipot 32001353 LoRaWAN module driver for wmodlib.
//!
//! The module speaks a binary protocol over a 115200 8N1 UART. This crate
//! provides:
//!
//! - **Frame codec** ([`frame`]) -- encode frames, checksums and the
//!   command/reply/indication code tables.
//! - **Receiver** ([`receiver`]) -- a deadline-driven state machine that
//!   finds frame boundaries and resynchronizes after garbage or corrupted
//!   frames.
//! - **Correlator** ([`correlator`]) -- retries until the reply to a command
//!   arrives, diverting indications into an [`IndicationQueue`].
//! - **Command builders** ([`commands`]) -- validated payloads, reply parsers
//!   and status codes for every supported operation.
//! - **MipotModule** ([`module`]) -- the
//!   [`WirelessModule`](wmodlib_core::WirelessModule) implementation and the
//!   typed command façade.
//! - **MipotBuilder** ([`builder`]) -- fluent construction with retry, timing
//!   and serial settings.
//!
//! # Example
//!
//! ```
//! use wmodlib_mipot::commands::cmd_get_fw_version;
//! use wmodlib_mipot::frame::checksum_ok;
//!
//! let bytes = cmd_get_fw_version().encode().unwrap();
//! assert_eq!(bytes, vec![0xAA, 0x34, 0x00, 0x22]);
//!
//! // Firmware version reply carrying 0x12345678.
//! let reply = [0xAA, 0xB4, 0x04, 0x78, 0x56, 0x34, 0x12, 0x8A];
//! assert!(checksum_ok(&reply));
//! ```

mod awake;
pub mod builder;
pub mod commands;
pub mod correlator;
pub mod eeprom;
pub mod frame;
pub mod indications;
pub mod module;
pub mod queue;
pub mod receiver;

pub use builder::MipotBuilder;
pub use commands::{ActivationStatus, ChannelStatus, Command, JoinMode, JoinStatus, TxStatus};
pub use correlator::ReplyPolicy;
pub use eeprom::{LoRaWanClass, NetworkType};
pub use frame::DecodedFrame;
pub use module::MipotModule;
pub use queue::IndicationQueue;
