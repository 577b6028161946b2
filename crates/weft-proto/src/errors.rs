//! Error types for the Weft wire format.
//!
//! All errors are structured, testable, and carry the observed values that
//! triggered them. Every decode failure in this crate is connection-fatal
//! for the multiplexer; the non-breaking extension bit is surfaced on the
//! decoded frame instead of as an error.

use thiserror::Error;

/// Protocol-level errors that can occur during frame encoding and decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame has fewer bytes than its header demands
    #[error("short frame: header demands {expected} bytes, got {actual}")]
    ShortFrame {
        /// Minimum size the header demands
        expected: usize,
        /// Actual size received
        actual: usize,
    },

    /// A breaking reserved bit is set in the flags byte
    #[error("reserved flag bits set: {flags:#04x}")]
    ReservedBits {
        /// The offending flags byte
        flags: u8,
    },

    /// The reserved system command (3) was used
    #[error("reserved system command in flags: {flags:#04x}")]
    ReservedCommand {
        /// The offending flags byte
        flags: u8,
    },

    /// Channel id does not fit in 48 bits
    #[error("channel id out of range: {id:#x} exceeds 48 bits")]
    ChannelIdOutOfRange {
        /// The offending channel id
        id: u64,
    },
}

/// Convenient Result type alias for wire format operations
pub type Result<T> = std::result::Result<T, ProtocolError>;
