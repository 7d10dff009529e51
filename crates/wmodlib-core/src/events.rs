//! Parsed asynchronous module indications.
//!
//! Modules emit indications at any time: the result of a network join, the
//! outcome of an uplink, or a downlink message. Drivers collect the raw
//! frames and parse them into [`Indication`] values on request.

/// An asynchronous event reported by a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Indication {
    /// The network join procedure finished.
    Join {
        /// `true` if the module joined the network.
        success: bool,
    },

    /// A confirmed uplink finished.
    TxConfirmed {
        /// Module status byte (0 = acknowledged).
        status: u8,
        /// Remaining module-specific payload bytes.
        details: Vec<u8>,
    },

    /// An unconfirmed uplink finished.
    TxUnconfirmed {
        /// Module status byte (0 = sent).
        status: u8,
        /// Remaining module-specific payload bytes.
        details: Vec<u8>,
    },

    /// A downlink message was received.
    RxMessage {
        /// Module status byte.
        status: u8,
        /// Remaining payload bytes (port, metadata and application data).
        data: Vec<u8>,
    },
}

impl Indication {
    /// Short lowercase name, e.g. for log output.
    pub fn name(&self) -> &'static str {
        match self {
            Indication::Join { .. } => "join",
            Indication::TxConfirmed { .. } => "tx_msg_con",
            Indication::TxUnconfirmed { .. } => "tx_msg_uncon",
            Indication::RxMessage { .. } => "rx_msg",
        }
    }
}
