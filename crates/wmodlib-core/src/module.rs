//! The `WirelessModule` trait -- capability set shared by module drivers.
//!
//! Each module family (crate) provides one concrete type implementing this
//! trait. Family-specific operations (joining, EEPROM access, channel
//! setup) live on the concrete type; this trait covers the primitives every
//! serial-attached module offers: pin control, framing a command onto the
//! wire, and receiving one validated frame.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Static identification of a module driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    /// Module vendor, e.g. `"Mipot"`.
    pub manufacturer: &'static str,
    /// Vendor part number, e.g. `"32001353"`.
    pub model: &'static str,
}

impl fmt::Display for ModuleInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.manufacturer, self.model)
    }
}

/// Asynchronous interface to a serial-attached wireless module.
///
/// Methods take `&self`: implementations serialize transactions internally
/// so that a transmit and its reply are never interleaved with another
/// caller's traffic.
#[async_trait]
pub trait WirelessModule: Send + Sync {
    /// The wake/reset pin set used by this driver.
    type Pins: Send;
    /// An outbound command before framing.
    type Command: Send + Sync;
    /// A validated inbound frame.
    type Frame: Send;

    /// Return static information about the module.
    fn info(&self) -> &ModuleInfo;

    /// Replace the control pins and drive them to their idle levels.
    async fn set_pin_configuration(&self, pins: Self::Pins) -> Result<()>;

    /// Let the module go to sleep.
    async fn sleep(&self) -> Result<()>;

    /// Wake the module so it accepts serial input.
    async fn wakeup(&self) -> Result<()>;

    /// Hard-reset the module and wait until it is ready again.
    async fn reset(&self) -> Result<()>;

    /// Wake the module and write one framed command.
    ///
    /// Does not wait for a reply and leaves the module awake.
    async fn transmit(&self, command: &Self::Command) -> Result<()>;

    /// Receive one validated frame within `timeout`.
    ///
    /// `expected` is the reply code the caller is waiting for, or `None`
    /// to accept any reply or indication. Returns the frame and whether it
    /// is an indication.
    async fn receive(&self, timeout: Duration, expected: Option<u8>)
    -> Result<(Self::Frame, bool)>;
}
