//! Deadline-driven frame receiver.
//!
//! [`receive`] reads bytes from a [`Transport`] and yields exactly one
//! validated frame. Every read is bounded by one absolute deadline, so
//! time spent discarding garbage or corrupted frames counts against the
//! caller's budget instead of extending it.
//!
//! The parser resynchronizes, returning to the sync search, whenever a
//! code byte is not acceptable or a checksum fails. Neither condition is
//! reported to the caller.

use tokio::time::Instant;
use tracing::{debug, trace};

use wmodlib_core::error::{Error, Result};
use wmodlib_core::transport::Transport;

use crate::frame::{DecodedFrame, SYNC, is_indication_code, is_reply_code, sum8};

/// Receiver states. Each transition reads from the transport.
#[derive(Debug)]
enum State {
    /// Discarding bytes until a sync byte.
    HuntSync,
    /// Sync seen; waiting for an acceptable code byte.
    HuntCode,
    /// Code accepted; waiting for the length byte.
    ReadLength { code: u8 },
    /// Reading `length` payload bytes plus the checksum.
    ReadBody { code: u8, length: u8 },
}

/// Returns `true` if `code` may start a frame while waiting for `expected`.
///
/// With an expected reply code only that code or an indication is taken.
/// Without one, any reply to a known command or any indication is taken.
pub fn accepts_code(expected: Option<u8>, code: u8) -> bool {
    if is_indication_code(code) {
        return true;
    }
    match expected {
        Some(expected) => code == expected,
        None => is_reply_code(code),
    }
}

/// Receive one validated frame before `deadline`.
///
/// `expected` is the reply code the caller is waiting for, or `None` to
/// accept any reply or indication. Returns the frame and whether it is an
/// indication.
///
/// # Errors
///
/// Returns [`Error::Timeout`] if no complete, valid frame arrived before
/// the deadline. Transport errors other than timeouts are propagated.
pub async fn receive(
    transport: &mut dyn Transport,
    deadline: Instant,
    expected: Option<u8>,
) -> Result<(DecodedFrame, bool)> {
    let mut state = State::HuntSync;
    loop {
        state = match state {
            State::HuntSync => {
                let byte = read_byte(transport, deadline).await?;
                if byte == SYNC {
                    State::HuntCode
                } else {
                    trace!("discarding 0x{byte:02X} while hunting sync");
                    State::HuntSync
                }
            }
            State::HuntCode => {
                let byte = read_byte(transport, deadline).await?;
                if byte == SYNC {
                    // Filler between frames.
                    State::HuntCode
                } else if accepts_code(expected, byte) {
                    State::ReadLength { code: byte }
                } else {
                    debug!("unexpected code byte 0x{byte:02X}, resynchronizing");
                    State::HuntSync
                }
            }
            State::ReadLength { code } => {
                let length = read_byte(transport, deadline).await?;
                State::ReadBody { code, length }
            }
            State::ReadBody { code, length } => {
                let mut body = vec![0u8; length as usize + 1];
                let n = transport.read_exact_until(&mut body, deadline).await?;
                if n < body.len() {
                    debug!(
                        "timed out in frame 0x{code:02X} after {n} of {} bytes",
                        body.len()
                    );
                    return Err(Error::Timeout);
                }

                if sum8(&[SYNC, code, length]).wrapping_add(sum8(&body)) != 0 {
                    debug!("checksum mismatch in frame 0x{code:02X}, resynchronizing");
                    State::HuntSync
                } else {
                    body.truncate(length as usize);
                    let frame = DecodedFrame {
                        code,
                        length,
                        payload: body,
                    };
                    let indication = frame.is_indication();
                    trace!(?frame, indication, "frame received");
                    return Ok((frame, indication));
                }
            }
        };
    }
}

async fn read_byte(transport: &mut dyn Transport, deadline: Instant) -> Result<u8> {
    let mut byte = [0u8; 1];
    match transport.read_exact_until(&mut byte, deadline).await? {
        1 => Ok(byte[0]),
        _ => Err(Error::Timeout),
    }
}
