//! Request/reply correlation.
//!
//! After a command is written, the module may emit indications before the
//! reply arrives. The [`Correlator`] keeps receiving until it sees the reply
//! with the expected length, diverting indications into the
//! [`IndicationQueue`], for a bounded number of attempts.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use wmodlib_core::error::{Error, Result};
use wmodlib_core::transport::Transport;

use crate::frame::{DecodedFrame, reply_code};
use crate::queue::IndicationQueue;
use crate::receiver;

/// Default number of receive attempts per command.
pub const DEFAULT_MAX_RETRIES: u32 = 8;

/// What to return when attempts run out without a matching reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReplyPolicy {
    /// Return the last frame observed, even if it is an indication or a
    /// reply of the wrong length. Callers must validate the payload.
    #[default]
    BestEffort,
    /// Fail with [`Error::NoReplyAfterRetries`].
    Strict,
}

/// Matches outstanding requests to their replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Correlator {
    /// Receive attempts per request. Indications, wrong-length replies and
    /// timeouts each use one attempt.
    pub max_retries: u32,
    pub policy: ReplyPolicy,
}

impl Default for Correlator {
    fn default() -> Self {
        Correlator {
            max_retries: DEFAULT_MAX_RETRIES,
            policy: ReplyPolicy::default(),
        }
    }
}

impl Correlator {
    pub fn new(max_retries: u32, policy: ReplyPolicy) -> Self {
        Correlator {
            max_retries,
            policy,
        }
    }

    /// Wait for the reply to `command`.
    ///
    /// Each attempt gets a fresh deadline of `timeout` from its start. A
    /// reply is accepted when its length matches `expected_len`, or
    /// unconditionally when `expected_len` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoReplyAfterRetries`] if no frame was observed at
    /// all, or if no acceptable reply was observed under
    /// [`ReplyPolicy::Strict`]. Transport errors other than timeouts are
    /// propagated immediately.
    pub async fn request_reply(
        &self,
        transport: &mut dyn Transport,
        queue: &mut IndicationQueue,
        command: u8,
        expected_len: Option<u8>,
        timeout: Duration,
    ) -> Result<DecodedFrame> {
        let expected = reply_code(command);
        let mut last = None;

        for attempt in 1..=self.max_retries {
            let deadline = Instant::now() + timeout;
            match receiver::receive(transport, deadline, Some(expected)).await {
                Ok((frame, true)) => {
                    debug!(
                        attempt,
                        "queueing indication 0x{:02X} while waiting for 0x{expected:02X}",
                        frame.code
                    );
                    queue.try_enqueue(frame.clone());
                    last = Some(frame);
                }
                Ok((frame, false)) => {
                    if expected_len.is_none_or(|len| len == frame.length) {
                        return Ok(frame);
                    }
                    debug!(
                        attempt,
                        "reply 0x{expected:02X} has length {}, expected {expected_len:?}",
                        frame.length
                    );
                    last = Some(frame);
                }
                Err(Error::Timeout) => {
                    debug!(attempt, "no reply 0x{expected:02X} within {timeout:?}");
                }
                Err(e) => return Err(e),
            }
        }

        match (self.policy, last) {
            (ReplyPolicy::BestEffort, Some(frame)) => {
                warn!(
                    "no matching reply to 0x{command:02X} after {} attempts, using last frame 0x{:02X}",
                    self.max_retries, frame.code
                );
                Ok(frame)
            }
            _ => Err(Error::NoReplyAfterRetries {
                command,
                attempts: self.max_retries,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wmodlib_test_harness::MockTransport;

    use crate::frame::encode_frame;

    const TIMEOUT: Duration = Duration::from_millis(250);

    #[tokio::test(start_paused = true)]
    async fn indication_before_reply_is_queued() {
        let mut mock = MockTransport::new();
        mock.push_incoming(&encode_frame(0x48, &[0x00]).unwrap());
        mock.push_incoming(&encode_frame(0xC6, &[0x00]).unwrap());
        let mut queue = IndicationQueue::default();

        let frame = Correlator::default()
            .request_reply(&mut mock, &mut queue, 0x46, Some(1), TIMEOUT)
            .await
            .unwrap();
        assert_eq!(frame.code, 0xC6);
        assert_eq!(frame.payload, vec![0x00]);

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.try_dequeue().unwrap().code, 0x48);
    }

    #[tokio::test(start_paused = true)]
    async fn any_length_accepted_without_expectation() {
        let mut mock = MockTransport::new();
        mock.push_incoming(&encode_frame(0xB3, &[0x00, 0x01, 0x02]).unwrap());
        let mut queue = IndicationQueue::default();

        let frame = Correlator::default()
            .request_reply(&mut mock, &mut queue, 0x33, None, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(frame.length, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_length_then_correct_reply() {
        let mut mock = MockTransport::new();
        mock.push_incoming(&encode_frame(0xB4, &[0x01]).unwrap());
        mock.push_incoming(&encode_frame(0xB4, &[0x78, 0x56, 0x34, 0x12]).unwrap());
        let mut queue = IndicationQueue::default();

        let frame = Correlator::default()
            .request_reply(&mut mock, &mut queue, 0x34, Some(4), TIMEOUT)
            .await
            .unwrap();
        assert_eq!(frame.length, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn best_effort_returns_last_mismatched_frame() {
        let mut mock = MockTransport::new();
        for _ in 0..8 {
            mock.push_incoming(&encode_frame(0xB4, &[0x01]).unwrap());
        }
        let mut queue = IndicationQueue::default();

        let frame = Correlator::new(8, ReplyPolicy::BestEffort)
            .request_reply(&mut mock, &mut queue, 0x34, Some(4), TIMEOUT)
            .await
            .unwrap();
        assert_eq!(frame.code, 0xB4);
        assert_eq!(frame.length, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn strict_fails_after_mismatches() {
        let mut mock = MockTransport::new();
        for _ in 0..8 {
            mock.push_incoming(&encode_frame(0xB4, &[0x01]).unwrap());
        }
        let mut queue = IndicationQueue::default();

        let err = Correlator::new(8, ReplyPolicy::Strict)
            .request_reply(&mut mock, &mut queue, 0x34, Some(4), TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::NoReplyAfterRetries {
                command: 0x34,
                attempts: 8
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn silence_fails_under_both_policies() {
        for policy in [ReplyPolicy::BestEffort, ReplyPolicy::Strict] {
            let mut mock = MockTransport::new();
            let mut queue = IndicationQueue::default();
            let start = Instant::now();

            let err = Correlator::new(3, policy)
                .request_reply(&mut mock, &mut queue, 0x42, Some(1), TIMEOUT)
                .await
                .unwrap_err();
            assert!(matches!(err, Error::NoReplyAfterRetries { attempts: 3, .. }));
            assert_eq!(start.elapsed(), TIMEOUT * 3);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn indications_use_up_attempts() {
        let mut mock = MockTransport::new();
        for n in 0..3 {
            mock.push_incoming(&encode_frame(0x49, &[0x00, n]).unwrap());
        }
        mock.push_incoming(&encode_frame(0xC2, &[0x02]).unwrap());
        let mut queue = IndicationQueue::default();

        let err = Correlator::new(3, ReplyPolicy::Strict)
            .request_reply(&mut mock, &mut queue, 0x42, Some(1), TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoReplyAfterRetries { .. }));
        assert_eq!(queue.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn best_effort_may_return_an_indication() {
        let mut mock = MockTransport::new();
        mock.push_incoming(&encode_frame(0x41, &[0x00]).unwrap());
        let mut queue = IndicationQueue::default();

        let frame = Correlator::new(2, ReplyPolicy::BestEffort)
            .request_reply(&mut mock, &mut queue, 0x40, Some(1), TIMEOUT)
            .await
            .unwrap();
        assert!(frame.is_indication());
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn transport_errors_propagate() {
        let mut mock = MockTransport::new();
        mock.set_connected(false);
        let mut queue = IndicationQueue::default();

        let err = Correlator::default()
            .request_reply(&mut mock, &mut queue, 0x34, Some(4), TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotConnected));
    }
}
