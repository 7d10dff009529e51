//! MipotBuilder -- fluent builder for constructing [`MipotModule`] instances.
//!
//! Separates configuration from construction so that callers can set up
//! serial port parameters, the reply policy and pin timing before the
//! transport is opened.
//!
//! # Example
//!
//! ```no_run
//! use wmodlib_core::{PinConfiguration, UnconnectedPin};
//! use wmodlib_mipot::MipotBuilder;
//! use wmodlib_mipot::correlator::ReplyPolicy;
//!
//! # async fn example() -> wmodlib_core::Result<()> {
//! let module = MipotBuilder::new()
//!     .serial_port("/dev/ttyS0")
//!     .reply_policy(ReplyPolicy::Strict)
//!     .build(PinConfiguration::new(UnconnectedPin, UnconnectedPin))
//!     .await?;
//! println!("firmware {:08X}", module.get_fw_version().await?);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use embedded_hal::digital::OutputPin;
use tracing::debug;

use wmodlib_core::error::{Error, Result};
use wmodlib_core::pins::PinConfiguration;
use wmodlib_core::transport::Transport;
use wmodlib_transport::{SerialConfig, SerialTransport};

use crate::correlator::{Correlator, DEFAULT_MAX_RETRIES, ReplyPolicy};
use crate::module::{MipotModule, Timing};
use crate::queue::{DEFAULT_QUEUE_CAPACITY, IndicationQueue};

/// Fluent builder for [`MipotModule`].
///
/// Every setting has a default matching the module datasheet, so the
/// simplest usage is:
///
/// ```ignore
/// let module = MipotBuilder::new()
///     .serial_port("/dev/ttyS0")
///     .build(pins)
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct MipotBuilder {
    serial_port: Option<String>,
    baud_rate: Option<u32>,
    serial_config: SerialConfig,
    max_retries: u32,
    reply_policy: ReplyPolicy,
    wake_delay: Duration,
    reset_pulse: Duration,
    reset_settle: Duration,
    queue_capacity: usize,
}

impl MipotBuilder {
    pub fn new() -> Self {
        MipotBuilder {
            serial_port: None,
            baud_rate: None,
            serial_config: SerialConfig::default(),
            max_retries: DEFAULT_MAX_RETRIES,
            reply_policy: ReplyPolicy::BestEffort,
            wake_delay: Duration::from_millis(1),
            reset_pulse: Duration::from_millis(100),
            reset_settle: Duration::from_secs(2),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Set the serial port path (e.g. `/dev/ttyS0` or `COM3`).
    pub fn serial_port(mut self, port: &str) -> Self {
        self.serial_port = Some(port.to_string());
        self
    }

    /// Override the baud rate (default: 115200).
    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.baud_rate = Some(baud);
        self
    }

    /// Replace the whole serial line configuration.
    ///
    /// A baud rate set with [`baud_rate()`](Self::baud_rate) still wins.
    pub fn serial_config(mut self, config: SerialConfig) -> Self {
        self.serial_config = config;
        self
    }

    /// Set the number of receive attempts per command (default: 8).
    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Choose what a command returns when no matching reply arrives
    /// (default: [`ReplyPolicy::BestEffort`]).
    pub fn reply_policy(mut self, policy: ReplyPolicy) -> Self {
        self.reply_policy = policy;
        self
    }

    /// Set the pause between waking the module and writing (default: 1 ms).
    pub fn wake_delay(mut self, delay: Duration) -> Self {
        self.wake_delay = delay;
        self
    }

    /// Set how long the reset line is held low (default: 100 ms).
    pub fn reset_pulse(mut self, pulse: Duration) -> Self {
        self.reset_pulse = pulse;
        self
    }

    /// Set the wait after a reset before the module is used (default: 2 s).
    pub fn reset_settle(mut self, settle: Duration) -> Self {
        self.reset_settle = settle;
        self
    }

    /// Set the indication queue capacity (default: 32).
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Build a [`MipotModule`] with a caller-provided transport.
    ///
    /// This is the entry point for testing (pass a `MockTransport` from
    /// `wmodlib-test-harness`) and for links other than a local UART.
    /// Both pins are driven to their idle level.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `max_retries` is zero, or
    /// [`Error::Pin`] if a pin cannot be driven.
    pub async fn build_with_transport<W, R>(
        self,
        transport: Box<dyn Transport>,
        pins: PinConfiguration<W, R>,
    ) -> Result<MipotModule<W, R>>
    where
        W: OutputPin + Send,
        R: OutputPin + Send,
    {
        if self.max_retries == 0 {
            return Err(Error::InvalidArgument(
                "max_retries must be at least 1".into(),
            ));
        }

        let mut pins = pins;
        pins.set_idle()?;

        debug!(
            max_retries = self.max_retries,
            policy = ?self.reply_policy,
            queue_capacity = self.queue_capacity,
            "building Mipot module"
        );

        Ok(MipotModule::new(
            transport,
            pins,
            IndicationQueue::new(self.queue_capacity),
            Correlator::new(self.max_retries, self.reply_policy),
            Timing {
                wake_delay: self.wake_delay,
                reset_pulse: self.reset_pulse,
                reset_settle: self.reset_settle,
            },
        ))
    }

    /// Build a [`MipotModule`] on a serial port.
    ///
    /// Requires that [`serial_port()`](Self::serial_port) has been called.
    pub async fn build<W, R>(self, pins: PinConfiguration<W, R>) -> Result<MipotModule<W, R>>
    where
        W: OutputPin + Send,
        R: OutputPin + Send,
    {
        let port = self.serial_port.as_deref().ok_or_else(|| {
            Error::InvalidArgument("serial_port is required for build()".into())
        })?;
        let mut config = self.serial_config.clone();
        if let Some(baud) = self.baud_rate {
            config.baud_rate = baud;
        }

        let transport = SerialTransport::open_with_config(port, config).await?;
        self.build_with_transport(Box::new(transport), pins).await
    }
}

impl Default for MipotBuilder {
    fn default() -> Self {
        Self::new()
    }
}
