//! wmodlib-test-harness: Test utilities for wmodlib drivers.
//!
//! This crate provides [`MockTransport`] for deterministic testing of
//! protocol engines without real module hardware, and [`MockPin`] for
//! observing wake/reset line activity.

pub mod mock_pin;
pub mod mock_serial;

pub use mock_pin::{MockPin, MockPinError};
pub use mock_serial::{MockTransport, SentLog};
