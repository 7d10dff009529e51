//! Scoped wake window.
//!
//! The module only listens on its UART while the wake line is held low.
//! [`AwakeWindow`] drives the line low when opened and high again when it
//! is closed or dropped, so an early return, an error or a cancelled future
//! never leaves the module awake.

use std::time::Duration;

use embedded_hal::digital::{OutputPin, PinState};
use tracing::{trace, warn};

use wmodlib_core::Result;
use wmodlib_core::pins::drive;

/// Holds the wake line low for the duration of one transaction.
pub(crate) struct AwakeWindow<'a, P: OutputPin> {
    pin: &'a mut P,
    released: bool,
}

impl<'a, P: OutputPin> AwakeWindow<'a, P> {
    /// Wake the module and wait `wake_delay` before returning.
    pub(crate) async fn open(pin: &'a mut P, wake_delay: Duration) -> Result<Self> {
        let mut window = AwakeWindow {
            pin,
            released: false,
        };
        drive(&mut *window.pin, "wakeup", PinState::Low)?;
        trace!("wake line low");
        tokio::time::sleep(wake_delay).await;
        Ok(window)
    }

    /// Let the module sleep, reporting a pin failure.
    pub(crate) fn close(mut self) -> Result<()> {
        self.released = true;
        drive(&mut *self.pin, "wakeup", PinState::High)?;
        trace!("wake line high");
        Ok(())
    }
}

impl<P: OutputPin> Drop for AwakeWindow<'_, P> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = drive(&mut *self.pin, "wakeup", PinState::High) {
            warn!("failed to put module to sleep: {e}");
        }
    }
}
