//! Mock output pin that records every level it is driven to.

use std::sync::{Arc, Mutex};

use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin};

/// Error returned by a [`MockPin`] configured to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockPinError;

impl embedded_hal::digital::Error for MockPinError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

#[derive(Debug, Default)]
struct PinLog {
    history: Vec<bool>,
    failing: bool,
}

/// An [`OutputPin`] backed by shared memory.
///
/// Clones share state, so a test can keep one handle while the driver owns
/// another. `true` in the history means the pin was driven high.
#[derive(Debug, Clone, Default)]
pub struct MockPin(Arc<Mutex<PinLog>>);

impl MockPin {
    /// Create a pin that has never been driven.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pin whose every write fails.
    pub fn failing() -> Self {
        let pin = Self::default();
        pin.set_failing(true);
        pin
    }

    /// Make subsequent writes fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut log) = self.0.lock() {
            log.failing = failing;
        }
    }

    /// Every level written so far, oldest first.
    pub fn history(&self) -> Vec<bool> {
        self.0.lock().map(|log| log.history.clone()).unwrap_or_default()
    }

    /// The last level written, or `None` if the pin was never driven.
    pub fn level(&self) -> Option<bool> {
        self.history().last().copied()
    }

    /// `true` if the pin was last driven high.
    pub fn is_high(&self) -> bool {
        self.level() == Some(true)
    }

    /// Forget the recorded history.
    pub fn clear_history(&self) {
        if let Ok(mut log) = self.0.lock() {
            log.history.clear();
        }
    }

    fn write(&mut self, high: bool) -> Result<(), MockPinError> {
        let mut log = self.0.lock().map_err(|_| MockPinError)?;
        if log.failing {
            return Err(MockPinError);
        }
        log.history.push(high);
        Ok(())
    }
}

impl ErrorType for MockPin {
    type Error = MockPinError;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write(true)
    }
}
