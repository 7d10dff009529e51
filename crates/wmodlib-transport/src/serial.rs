//! UART transport for module communication.
//!
//! [`SerialTransport`] implements [`Transport`] over a UART, a USB virtual
//! COM port or an RS-232 adapter. The modules driven by wmodlib run their
//! UART at 8 data bits, no parity, 1 stop bit; only the baud rate and the
//! optional RTS/CTS handshake are configurable.
//!
//! # Example
//!
//! ```no_run
//! use wmodlib_transport::SerialTransport;
//! use wmodlib_core::transport::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> wmodlib_core::Result<()> {
//! let mut transport = SerialTransport::open("/dev/ttyS0", 115_200).await?;
//! transport.send(&[0xAA, 0x34, 0x00, 0x22]).await?;
//!
//! let mut buf = [0u8; 64];
//! let n = transport.receive(&mut buf, Duration::from_millis(250)).await?;
//! # Ok(())
//! # }
//! ```

use std::io::ErrorKind;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{
    ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortBuilderExt, SerialStream,
    StopBits,
};
use tracing::{debug, error, info, trace, warn};
use wmodlib_core::error::{Error, Result};
use wmodlib_core::helpers::format_hex;
use wmodlib_core::transport::Transport;

/// Baud rate of the module UART after power-up.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// UART settings for a module link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// Baud rate.
    pub baud_rate: u32,
    /// Use RTS/CTS handshaking. Off for modules without handshake lines.
    pub hardware_flow_control: bool,
    /// Drop bytes already buffered by the OS when the port is opened.
    ///
    /// A module that was running before the port was opened may have left
    /// half a frame or stale indications in the input buffer.
    pub clear_input_on_open: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            hardware_flow_control: false,
            clear_input_on_open: true,
        }
    }
}

impl SerialConfig {
    fn flow_control(&self) -> FlowControl {
        if self.hardware_flow_control {
            FlowControl::Hardware
        } else {
            FlowControl::None
        }
    }
}

/// UART link to a module.
pub struct SerialTransport {
    port: Option<SerialStream>,
    port_name: String,
}

impl SerialTransport {
    /// Open `port` at `baud_rate` with the default settings.
    ///
    /// * `port` - device path, e.g. "/dev/ttyS0" on a Raspberry Pi or
    ///   "COM3" on Windows
    pub async fn open(port: &str, baud_rate: u32) -> Result<Self> {
        let config = SerialConfig {
            baud_rate,
            ..Default::default()
        };
        Self::open_with_config(port, config).await
    }

    /// Open `port` with explicit settings.
    pub async fn open_with_config(port: &str, config: SerialConfig) -> Result<Self> {
        debug!(
            port,
            baud_rate = config.baud_rate,
            hardware_flow_control = config.hardware_flow_control,
            "opening module UART"
        );

        let stream = tokio_serial::new(port, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(config.flow_control())
            .open_native_async()
            .map_err(|e| Error::Transport(format!("cannot open {port}: {e}")))?;

        if config.clear_input_on_open {
            if let Err(e) = stream.clear(ClearBuffer::Input) {
                warn!(port, error = %e, "could not discard stale input");
            }
        }

        info!(port, baud_rate = config.baud_rate, "module UART open");

        Ok(Self {
            port: Some(stream),
            port_name: port.to_string(),
        })
    }

    /// Device path the transport was opened on.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

/// A vanished USB adapter shows up as one of these kinds.
fn map_io_error(e: std::io::Error) -> Error {
    match e.kind() {
        ErrorKind::BrokenPipe | ErrorKind::NotConnected | ErrorKind::UnexpectedEof => {
            Error::ConnectionLost
        }
        _ => Error::Io(e),
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;
        trace!("{} >> {}", self.port_name, format_hex(data));

        if let Err(e) = port.write_all(data).await {
            error!(port = %self.port_name, error = %e, "UART write failed");
            return Err(map_io_error(e));
        }
        port.flush().await.map_err(map_io_error)
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;

        let n = tokio::time::timeout(timeout, port.read(buf))
            .await
            .map_err(|_| Error::Timeout)?
            .map_err(|e| {
                error!(port = %self.port_name, error = %e, "UART read failed");
                map_io_error(e)
            })?;
        if n == 0 {
            return Err(Error::ConnectionLost);
        }
        trace!("{} << {}", self.port_name, format_hex(&buf[..n]));
        Ok(n)
    }

    async fn close(&mut self) -> Result<()> {
        let Some(mut port) = self.port.take() else {
            return Ok(());
        };
        if let Err(e) = port.flush().await {
            warn!(port = %self.port_name, error = %e, "flush before close failed");
        }
        info!(port = %self.port_name, "module UART closed");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }
}
