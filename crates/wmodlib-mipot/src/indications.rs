//! Conversion of indication frames into [`Indication`] values.

use wmodlib_core::{Error, Indication, Result};

use crate::frame::{DecodedFrame, IND_JOIN, IND_RX_MESSAGE, IND_TX_CONFIRMED, IND_TX_UNCONFIRMED};

/// Parse an indication frame.
///
/// Join indications carry exactly one status byte. The other indications
/// start with a status byte; the remaining bytes are kept as-is.
///
/// # Errors
///
/// Returns [`Error::Protocol`] for a malformed payload or a code that is
/// not an indication.
pub fn parse_indication(frame: &DecodedFrame) -> Result<Indication> {
    match frame.code {
        IND_JOIN => match frame.payload.as_slice() {
            [status] => Ok(Indication::Join {
                success: *status == 0,
            }),
            other => Err(Error::Protocol(format!(
                "join indication must carry 1 byte, got {}",
                other.len()
            ))),
        },
        IND_TX_CONFIRMED => {
            let (status, details) = split_status(frame)?;
            Ok(Indication::TxConfirmed { status, details })
        }
        IND_TX_UNCONFIRMED => {
            let (status, details) = split_status(frame)?;
            Ok(Indication::TxUnconfirmed { status, details })
        }
        IND_RX_MESSAGE => {
            let (status, data) = split_status(frame)?;
            Ok(Indication::RxMessage { status, data })
        }
        code => Err(Error::Protocol(format!("unexpected indication 0x{code:02X}"))),
    }
}

fn split_status(frame: &DecodedFrame) -> Result<(u8, Vec<u8>)> {
    match frame.payload.split_first() {
        Some((status, rest)) => Ok((*status, rest.to_vec())),
        None => Err(Error::Protocol(format!(
            "indication 0x{:02X} has no status byte",
            frame.code
        ))),
    }
}
