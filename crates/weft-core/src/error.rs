//! Error types for the multiplexer core.
//!
//! This module distinguishes the one recoverable refusal (sending on a
//! channel that is no longer open) from the connection-fatal protocol
//! violations. Fatal errors are returned to the dispatch driver *after* the
//! multiplexer has already torn itself down.

use std::fmt;

use weft_proto::ProtocolError;

/// Errors that can occur during multiplexer operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MuxError {
    /// Send on a channel that is not open (closed locally, closed by the
    /// peer, or orphaned by multiplexer teardown)
    ChannelClosed {
        /// Id of the channel the send was attempted on
        channel_id: u64,
    },

    /// Inbound message failed to decode (short frame, breaking reserved
    /// bits, reserved system command)
    Protocol(ProtocolError),

    /// Data or close frame for a channel id in neither the open nor the
    /// closing map
    UnknownChannel {
        /// The unknown channel id
        channel_id: u64,
    },

    /// Open frame for a channel id that is already live
    DuplicateOpen {
        /// The duplicated channel id
        channel_id: u64,
    },

    /// Remotely opened channel id carries the locally owned parity
    ParityMismatch {
        /// The offending channel id
        channel_id: u64,
    },
}

impl fmt::Display for MuxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChannelClosed { channel_id } => {
                write!(f, "channel {} is closed", channel_id)
            },
            Self::Protocol(err) => write!(f, "protocol error: {}", err),
            Self::UnknownChannel { channel_id } => {
                write!(f, "frame for unknown channel {}", channel_id)
            },
            Self::DuplicateOpen { channel_id } => {
                write!(f, "duplicate open for channel {}", channel_id)
            },
            Self::ParityMismatch { channel_id } => {
                write!(f, "remote open for channel {} with local parity", channel_id)
            },
        }
    }
}

impl std::error::Error for MuxError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Protocol(err) => Some(err),
            _ => None,
        }
    }
}

impl MuxError {
    /// Returns true if this error tears down the whole connection.
    ///
    /// Every protocol violation is connection-fatal; there is no
    /// per-channel recovery. The only non-fatal refusal is a send on a
    /// channel that is no longer open, which the application may simply
    /// stop doing.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::ChannelClosed { .. })
    }
}

impl From<ProtocolError> for MuxError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err)
    }
}
