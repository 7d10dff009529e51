//! Error types for wmodlib.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport-layer, protocol-layer, and
//! argument-validation errors are all captured here.

/// The error type for all wmodlib operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (serial port, USB adapter).
    #[error("transport error: {0}")]
    Transport(String),

    /// A protocol-level error (short reply payload, malformed indication).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Timed out waiting for a byte or frame from the module.
    ///
    /// This typically indicates the module is asleep, unpowered, or the
    /// serial line settings are wrong.
    #[error("timeout waiting for response")]
    Timeout,

    /// An argument failed local validation. Raised before any I/O.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A command payload does not fit the one-byte length field.
    #[error("payload too large: {0} bytes (max 255)")]
    PayloadTooLarge(usize),

    /// The correlator exhausted its attempts without a matching reply.
    #[error("no reply to command 0x{command:02X} after {attempts} attempts")]
    NoReplyAfterRetries {
        /// Request command code (without the reply bit).
        command: u8,
        /// Number of receive attempts made.
        attempts: u32,
    },

    /// A command reply arrived where only an indication was acceptable.
    #[error("unexpected command reply 0x{0:02X}")]
    UnexpectedReply(u8),

    /// Driving a wake or reset pin failed.
    #[error("pin error: {0}")]
    Pin(String),

    /// No connection to the module has been established.
    #[error("not connected")]
    NotConnected,

    /// The connection to the module was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
