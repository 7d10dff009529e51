//! # wmodlib -- Async Drivers for LoRaWAN Radio Modules
//!
//! `wmodlib` is an asynchronous Rust library for driving LoRaWAN radio
//! modules attached to a host over a UART, such as a Raspberry Pi talking
//! to a Mipot 32001353 on its serial header.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use wmodlib::mipot::{JoinMode, MipotBuilder};
//! use wmodlib::{PinConfiguration, UnconnectedPin};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let module = MipotBuilder::new()
//!         .serial_port("/dev/ttyS0")
//!         .build(PinConfiguration::new(UnconnectedPin, UnconnectedPin))
//!         .await?;
//!
//!     println!("firmware {:08X}", module.get_fw_version().await?);
//!     module.join(JoinMode::Otaa).await?;
//!     if module.wait_for_join(Duration::from_secs(30)).await? == Some(true) {
//!         module.tx_msg(b"hello", 1, false).await?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! | Crate                   | Purpose                                        |
//! |-------------------------|------------------------------------------------|
//! | `wmodlib-core`          | Traits ([`WirelessModule`], [`Transport`]), pins, errors |
//! | `wmodlib-transport`     | Serial transport                               |
//! | `wmodlib-mipot`         | Mipot binary protocol driver                   |
//! | **`wmodlib`**           | This facade crate -- re-exports everything     |
//!
//! ## Feature Flags
//!
//! | Feature | Enables                              | Default |
//! |---------|--------------------------------------|---------|
//! | `mipot` | [`mipot`] module (binary protocol)   | yes     |
//!
//! ## Control Pins
//!
//! Wake and reset lines are plain `embedded-hal` output pins grouped in a
//! [`PinConfiguration`]. Any GPIO crate implementing
//! `embedded_hal::digital::OutputPin` can be used; [`UnconnectedPin`] stands
//! in for a line that is not wired.

pub use wmodlib_core::*;

/// Serial transport.
pub mod transport {
    pub use wmodlib_transport::*;
}

/// Mipot 32001353 binary protocol backend.
///
/// Provides [`MipotModule`](mipot::MipotModule) and
/// [`MipotBuilder`](mipot::MipotBuilder) for driving the module over its
/// framed, checksummed serial protocol.
#[cfg(feature = "mipot")]
pub mod mipot {
    pub use wmodlib_mipot::*;
}

/// Returns the modules supported by the enabled backends.
///
/// # Example
///
/// ```
/// for info in wmodlib::supported_modules() {
///     println!("{info}");
/// }
/// ```
pub fn supported_modules() -> Vec<ModuleInfo> {
    #[allow(unused_mut)]
    let mut modules = Vec::new();

    #[cfg(feature = "mipot")]
    modules.push(mipot::module::MIPOT_32001353);

    modules
}
