//! Scripted UART stand-in for driver tests.
//!
//! [`MockTransport`] implements the [`Transport`] trait with a scripted
//! inbound byte stream. Bytes can be queued up front (unsolicited traffic)
//! or released when a matching request is sent. Every chunk may carry a
//! delay, which is spent with `tokio::time::sleep`; tests that run with a
//! paused clock (`#[tokio::test(start_paused = true)]`) therefore exercise
//! deadlines without waiting in real time.
//!
//! # Example
//!
//! ```
//! use wmodlib_test_harness::MockTransport;
//!
//! let mut mock = MockTransport::new();
//! // When the driver sends "get firmware version", answer with version 0x12345678.
//! mock.expect(&[0xAA, 0x34, 0x00, 0x22],
//!             &[0xAA, 0xB4, 0x04, 0x78, 0x56, 0x34, 0x12, 0x8A]);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use wmodlib_core::error::{Error, Result};
use wmodlib_core::transport::Transport;

/// Bytes that become readable after `delay` has elapsed.
#[derive(Debug, Clone)]
struct Chunk {
    delay: Duration,
    bytes: Vec<u8>,
}

/// A pre-loaded request/response pair.
#[derive(Debug, Clone)]
struct Expectation {
    request: Vec<u8>,
    response: Chunk,
}

/// Shared record of everything written to a [`MockTransport`].
///
/// Cloned handles stay valid after the transport has been moved into a
/// driver, so tests can inspect traffic from the outside.
#[derive(Debug, Clone, Default)]
pub struct SentLog(Arc<Mutex<Vec<Vec<u8>>>>);

impl SentLog {
    /// All writes so far, one element per `send()` call.
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.0.lock().map(|log| log.clone()).unwrap_or_default()
    }

    /// Number of `send()` calls so far.
    pub fn len(&self) -> usize {
        self.0.lock().map(|log| log.len()).unwrap_or_default()
    }

    /// `true` if nothing has been sent.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, data: &[u8]) {
        if let Ok(mut log) = self.0.lock() {
            log.push(data.to_vec());
        }
    }
}

/// A scripted [`Transport`] for testing drivers without hardware.
///
/// Expectations are consumed in order. When `send()` is called, the data
/// is recorded and matched against the next expectation; its response is
/// appended to the inbound stream. A `send()` with no expectation left, or
/// with data that does not match, fails with [`Error::Protocol`].
///
/// `receive()` returns [`Error::Timeout`] after sleeping for the full
/// timeout when no inbound byte is due in time.
#[derive(Debug)]
pub struct MockTransport {
    expectations: VecDeque<Expectation>,
    incoming: VecDeque<Chunk>,
    connected: bool,
    sent_log: SentLog,
}

impl MockTransport {
    /// An open link with nothing scripted.
    pub fn new() -> Self {
        MockTransport {
            expectations: VecDeque::new(),
            incoming: VecDeque::new(),
            connected: true,
            sent_log: SentLog::default(),
        }
    }

    /// Add an expected request whose response is readable immediately.
    pub fn expect(&mut self, request: &[u8], response: &[u8]) {
        self.expect_delayed(request, Duration::ZERO, response);
    }

    /// Add an expected request whose response is readable after `delay`.
    pub fn expect_delayed(&mut self, request: &[u8], delay: Duration, response: &[u8]) {
        self.expectations.push_back(Expectation {
            request: request.to_vec(),
            response: Chunk {
                delay,
                bytes: response.to_vec(),
            },
        });
    }

    /// Queue inbound bytes that are readable immediately.
    pub fn push_incoming(&mut self, bytes: &[u8]) {
        self.push_incoming_after(Duration::ZERO, bytes);
    }

    /// Queue inbound bytes that become readable `delay` after the previous
    /// chunk was read.
    pub fn push_incoming_after(&mut self, delay: Duration, bytes: &[u8]) {
        self.incoming.push_back(Chunk {
            delay,
            bytes: bytes.to_vec(),
        });
    }

    /// Every write so far.
    pub fn sent_data(&self) -> Vec<Vec<u8>> {
        self.sent_log.frames()
    }

    /// A handle on the write log that outlives moving the mock into a driver.
    pub fn sent_log(&self) -> SentLog {
        self.sent_log.clone()
    }

    /// Scripted requests the driver has not sent yet.
    pub fn remaining_expectations(&self) -> usize {
        self.expectations.len()
    }

    /// Inbound bytes still waiting to be read.
    pub fn pending_bytes(&self) -> usize {
        self.incoming.iter().map(|c| c.bytes.len()).sum()
    }

    /// Simulate the link going away (`false`) or coming back.
    ///
    /// While down, every `send()` and `receive()` fails with
    /// [`Error::NotConnected`].
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        self.sent_log.push(data);

        let Some(expectation) = self.expectations.pop_front() else {
            return Err(Error::Protocol(
                "mock transport: write with nothing scripted".into(),
            ));
        };
        if data != expectation.request.as_slice() {
            return Err(Error::Protocol(format!(
                "mock transport: scripted {:02X?}, driver wrote {:02X?}",
                expectation.request, data
            )));
        }
        self.incoming.push_back(expectation.response);
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        if buf.is_empty() {
            return Ok(0);
        }

        // Skip exhausted chunks (e.g. empty expectation responses).
        while self.incoming.front().is_some_and(|c| c.bytes.is_empty()) {
            self.incoming.pop_front();
        }

        let Some(chunk) = self.incoming.front_mut() else {
            tokio::time::sleep(timeout).await;
            return Err(Error::Timeout);
        };

        if chunk.delay > timeout {
            chunk.delay -= timeout;
            tokio::time::sleep(timeout).await;
            return Err(Error::Timeout);
        }

        if !chunk.delay.is_zero() {
            tokio::time::sleep(chunk.delay).await;
            chunk.delay = Duration::ZERO;
        }

        let n = chunk.bytes.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk.bytes[..n]);
        chunk.bytes.drain(..n);
        if chunk.bytes.is_empty() {
            self.incoming.pop_front();
        }
        Ok(n)
    }

    async fn close(&mut self) -> Result<()> {
        self.connected = false;
        self.incoming.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
