//! Transport implementations for wmodlib.
//!
//! This crate provides concrete implementations of the
//! [`Transport`](wmodlib_core::Transport) trait from `wmodlib-core`:
//!
//! - [`SerialTransport`]: UART, USB virtual COM ports and RS-232 links
//!
//! # Example
//!
//! ```no_run
//! use wmodlib_transport::SerialTransport;
//! use wmodlib_core::transport::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> wmodlib_core::Result<()> {
//! // Mipot modules talk 115200 8N1 without flow control.
//! let mut transport = SerialTransport::open("/dev/ttyS0", 115_200).await?;
//!
//! // Get firmware version command (sync, code, length, checksum).
//! transport.send(&[0xAA, 0x34, 0x00, 0x22]).await?;
//!
//! let mut buf = [0u8; 64];
//! let n = transport.receive(&mut buf, Duration::from_millis(250)).await?;
//! # Ok(())
//! # }
//! ```

pub mod serial;

pub use serial::{DEFAULT_BAUD_RATE, SerialConfig, SerialTransport};
