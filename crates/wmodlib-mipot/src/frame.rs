//! Mipot frame encoder and code tables.
//!
//! Every message on the serial link, in either direction, is one frame:
//!
//! ```text
//! 0xAA <code> <len> <payload...> <checksum>
//! ```
//!
//! - Sync: a single `0xAA` byte
//! - `code`: command code for requests, `command | 0x80` for replies, or an
//!   indication code for unsolicited events
//! - `len`: payload length in bytes (the checksum is not counted)
//! - `checksum`: two's-complement negation of the 8-bit sum of all
//!   preceding bytes, so a valid frame sums to zero
//!
//! Decoding is incremental and deadline-driven, see [`receiver`](crate::receiver).

use bytes::{BufMut, BytesMut};
use wmodlib_core::{Error, Result};

/// Sync byte opening every frame.
pub const SYNC: u8 = 0xAA;

/// Bit set on a command code to form its reply code.
pub const REPLY_BIT: u8 = 0x80;

/// Largest payload the one-byte length field can describe.
pub const MAX_PAYLOAD: usize = 255;

/// Every command code the module understands.
///
/// A byte with [`REPLY_BIT`] set whose low seven bits appear here is a
/// valid reply code.
pub const COMMAND_CODES: [u8; 23] = [
    0x30, 0x31, 0x32, 0x33, 0x34, 0x35, 0x36, 0x40, 0x42, 0x43, 0x44, 0x45, 0x46, 0x4A, 0x4B,
    0x50, 0x51, 0x52, 0x53, 0x54, 0x55, 0x57, 0x58,
];

/// Join result indication.
pub const IND_JOIN: u8 = 0x41;
/// Confirmed uplink result indication.
pub const IND_TX_CONFIRMED: u8 = 0x47;
/// Unconfirmed uplink result indication.
pub const IND_TX_UNCONFIRMED: u8 = 0x48;
/// Downlink message indication.
pub const IND_RX_MESSAGE: u8 = 0x49;

/// Codes of frames the module sends unsolicited.
pub const INDICATION_CODES: [u8; 4] = [IND_JOIN, IND_TX_CONFIRMED, IND_TX_UNCONFIRMED, IND_RX_MESSAGE];

/// A validated inbound frame with sync and checksum stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    /// Reply or indication code.
    pub code: u8,
    /// Length byte as received. Always equals `payload.len()`.
    pub length: u8,
    /// Payload bytes.
    pub payload: Vec<u8>,
}

impl DecodedFrame {
    /// Returns `true` if this frame is an asynchronous indication.
    pub fn is_indication(&self) -> bool {
        is_indication_code(self.code)
    }

    /// Returns `true` if this frame is a reply to a known command.
    pub fn is_reply(&self) -> bool {
        is_reply_code(self.code)
    }

    /// Re-encode this frame into wire bytes.
    pub fn to_wire(&self) -> Result<Vec<u8>> {
        encode_frame(self.code, &self.payload)
    }
}

/// Returns `true` if `code` is one of the [`INDICATION_CODES`].
pub fn is_indication_code(code: u8) -> bool {
    INDICATION_CODES.contains(&code)
}

/// Returns `true` if `code` is a known command code.
pub fn is_command_code(code: u8) -> bool {
    COMMAND_CODES.contains(&code)
}

/// Returns `true` if `code` is the reply code of a known command.
pub fn is_reply_code(code: u8) -> bool {
    code & REPLY_BIT == REPLY_BIT && is_command_code(code & !REPLY_BIT)
}

/// The reply code the module uses to answer `command`.
pub fn reply_code(command: u8) -> u8 {
    command | REPLY_BIT
}

/// Compute the checksum byte for `bytes`.
///
/// Equivalent to `((sum ^ 0xFF) + 1) & 0xFF` over the 8-bit sum.
///
/// # Example
///
/// ```
/// use wmodlib_mipot::frame::checksum;
///
/// assert_eq!(checksum(&[0xAA, 0x34, 0x00]), 0x22);
/// ```
pub fn checksum(bytes: &[u8]) -> u8 {
    sum8(bytes).wrapping_neg()
}

/// Returns `true` if the 8-bit sum of the whole frame, checksum included,
/// is zero.
pub fn checksum_ok(frame: &[u8]) -> bool {
    sum8(frame) == 0
}

pub(crate) fn sum8(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Encode one frame ready for transmission.
///
/// # Errors
///
/// Returns [`Error::PayloadTooLarge`] if `payload` is longer than
/// [`MAX_PAYLOAD`] bytes.
///
/// # Example
///
/// ```
/// use wmodlib_mipot::frame::encode_frame;
///
/// // Get firmware version.
/// let bytes = encode_frame(0x34, &[]).unwrap();
/// assert_eq!(bytes, vec![0xAA, 0x34, 0x00, 0x22]);
/// ```
pub fn encode_frame(code: u8, payload: &[u8]) -> Result<Vec<u8>> {
    let len = u8::try_from(payload.len()).map_err(|_| Error::PayloadTooLarge(payload.len()))?;
    let mut buf = BytesMut::with_capacity(payload.len() + 4);
    buf.put_u8(SYNC);
    buf.put_u8(code);
    buf.put_u8(len);
    buf.put_slice(payload);
    let cs = checksum(&buf);
    buf.put_u8(cs);
    Ok(buf.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn encode_firmware_version_request() {
        assert_eq!(encode_frame(0x34, &[]).unwrap(), vec![0xAA, 0x34, 0x00, 0x22]);
    }

    #[test]
    fn encode_with_payload() {
        // Join, OTAA.
        let bytes = encode_frame(0x40, &[0x01]).unwrap();
        assert_eq!(bytes, vec![0xAA, 0x40, 0x01, 0x01, 0x14]);
        assert!(checksum_ok(&bytes));
    }

    #[test]
    fn encode_max_payload() {
        let bytes = encode_frame(0x32, &[0u8; MAX_PAYLOAD]).unwrap();
        assert_eq!(bytes.len(), MAX_PAYLOAD + 4);
        assert_eq!(bytes[2], 0xFF);
    }

    #[test]
    fn encode_rejects_oversized_payload() {
        let err = encode_frame(0x32, &[0u8; 256]).unwrap_err();
        assert!(matches!(err, Error::PayloadTooLarge(256)));
    }

    #[test]
    fn checksum_detects_corruption() {
        let mut bytes = encode_frame(0x46, &[0x01, 0x01, 0xDE, 0xAD]).unwrap();
        assert!(checksum_ok(&bytes));
        bytes[4] ^= 0x01;
        assert!(!checksum_ok(&bytes));
    }

    #[test]
    fn code_tables() {
        assert!(is_indication_code(0x41));
        assert!(is_indication_code(0x49));
        assert!(!is_indication_code(0xC1));

        assert!(is_reply_code(0xB4));
        assert!(is_reply_code(0xD7));
        assert!(!is_reply_code(0x34));
        // 0x37 is not a command, so 0xB7 is not a reply.
        assert!(!is_reply_code(0xB7));
        assert!(!is_reply_code(SYNC));

        assert_eq!(reply_code(0x46), 0xC6);
    }

    #[test]
    fn indication_and_reply_codes_are_disjoint() {
        for code in INDICATION_CODES {
            assert!(!is_reply_code(code));
        }
        for cmd in COMMAND_CODES {
            assert!(!is_indication_code(reply_code(cmd)));
        }
    }

    #[test]
    fn decoded_frame_classification() {
        let ind = DecodedFrame {
            code: 0x48,
            length: 1,
            payload: vec![0x00],
        };
        assert!(ind.is_indication());
        assert!(!ind.is_reply());
        assert_eq!(ind.to_wire().unwrap(), encode_frame(0x48, &[0x00]).unwrap());
    }

    proptest! {
        #[test]
        fn encoded_frames_always_verify(
            code in any::<u8>(),
            payload in proptest::collection::vec(any::<u8>(), 0..=MAX_PAYLOAD),
        ) {
            let bytes = encode_frame(code, &payload).unwrap();
            prop_assert!(checksum_ok(&bytes));
            prop_assert_eq!(bytes[2] as usize, payload.len());
            prop_assert_eq!(&bytes[3..bytes.len() - 1], payload.as_slice());
        }
    }
}
