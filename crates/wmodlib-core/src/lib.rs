//! wmodlib-core: Core traits, types, and error definitions for wmodlib.
//!
//! This crate defines the module-agnostic abstractions that every wmodlib
//! driver implements. Applications depend on these types without pulling in
//! a specific module driver.
//!
//! # Key types
//!
//! - [`WirelessModule`] -- the capability set shared by all module drivers
//! - [`Transport`] -- byte-level communication channel
//! - [`PinConfiguration`] -- wake/reset control lines
//! - [`Indication`] -- parsed asynchronous module events
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod events;
pub mod helpers;
pub mod module;
pub mod pins;
pub mod transport;

// Re-export key types at crate root for ergonomic `use wmodlib_core::*`.
pub use error::{Error, Result};
pub use events::Indication;
pub use helpers::{format_freq_mhz, format_hex};
pub use module::{ModuleInfo, WirelessModule};
pub use pins::{PinConfiguration, UnconnectedPin};
pub use transport::Transport;
