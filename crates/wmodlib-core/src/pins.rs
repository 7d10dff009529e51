//! Wake and reset control lines.
//!
//! Modules that sleep between transactions are woken by a dedicated output
//! line and can be hard-reset by another. Both lines are plain
//! [`OutputPin`]s from `embedded-hal`, so any GPIO backend (Linux character
//! device, sysfs, a microcontroller HAL) can drive them.
//!
//! Pin state is per driver instance: every driver owns its own
//! [`PinConfiguration`] and never shares it with another instance.

use std::convert::Infallible;
use std::fmt::Debug;

use embedded_hal::digital::{ErrorType, OutputPin, PinState};

use crate::error::{Error, Result};

/// The two output lines used to control a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinConfiguration<W, R> {
    /// Wake line. Active-low: driven low to wake, high to let the module sleep.
    pub wakeup: W,
    /// Reset line. Active-low: pulsed low to reset the module.
    pub reset: R,
}

impl<W, R> PinConfiguration<W, R> {
    /// Group a wake pin and a reset pin.
    pub fn new(wakeup: W, reset: R) -> Self {
        Self { wakeup, reset }
    }
}

impl<W: OutputPin, R: OutputPin> PinConfiguration<W, R> {
    /// Drive both lines to their idle level (module asleep, reset released).
    pub fn set_idle(&mut self) -> Result<()> {
        drive(&mut self.wakeup, "wakeup", PinState::High)?;
        drive(&mut self.reset, "reset", PinState::High)
    }
}

/// Drive `pin` to `state`, mapping a HAL error into [`Error::Pin`].
///
/// `name` identifies the line in the error message.
pub fn drive<P: OutputPin>(pin: &mut P, name: &str, state: PinState) -> Result<()> {
    pin.set_state(state).map_err(|e| pin_error(name, e))
}

fn pin_error(name: &str, e: impl Debug) -> Error {
    Error::Pin(format!("{name}: {e:?}"))
}

/// A pin that is not wired to anything.
///
/// Useful on boards where the wake line is tied low and the module is
/// therefore always awake, or where reset is not routed to a GPIO.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnconnectedPin;

impl ErrorType for UnconnectedPin {
    type Error = Infallible;
}

impl OutputPin for UnconnectedPin {
    fn set_low(&mut self) -> std::result::Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> std::result::Result<(), Self::Error> {
        Ok(())
    }
}
