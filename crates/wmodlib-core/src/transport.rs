//! Transport trait for module communication.
//!
//! The [`Transport`] trait abstracts over the physical link to a wireless
//! module. Implementations exist for serial ports and for scripted mock
//! transports used in tests.
//!
//! Protocol engines (e.g. the Mipot frame receiver in `wmodlib-mipot`)
//! operate on a `Transport` rather than directly on a serial port, enabling
//! both real hardware control and deterministic unit testing with
//! `MockTransport` from the `wmodlib-test-harness` crate.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{Error, Result};

/// Asynchronous byte-level transport to a module.
///
/// Implementations handle buffering and error recovery at the physical
/// layer. Framing, checksums and reply correlation are handled by the
/// protocol engines that consume this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write `data` to the module. Returns once every byte has left the
    /// host side of the link.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Read whatever the module has sent, up to `buf.len()` bytes.
    ///
    /// Waits at most `timeout` for the first byte and fails with
    /// [`Error::Timeout`] if none arrives.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Release the link. Later reads and writes fail with
    /// [`Error::NotConnected`].
    async fn close(&mut self) -> Result<()>;

    /// `true` until the link is closed or lost.
    fn is_connected(&self) -> bool;

    /// Fill `buf` from the transport until it is full or `deadline` passes.
    ///
    /// The read timeout is recomputed from the remaining time before every
    /// underlying read, so partial reads never extend the deadline. Returns
    /// the number of bytes read, which is less than `buf.len()` only when
    /// the deadline expired first.
    async fn read_exact_until(&mut self, buf: &mut [u8], deadline: Instant) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match self.receive(&mut buf[filled..], remaining).await {
                Ok(0) => tokio::task::yield_now().await,
                Ok(n) => filled += n,
                Err(Error::Timeout) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}
