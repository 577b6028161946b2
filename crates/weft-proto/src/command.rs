//! System commands for Weft frames.
//!
//! The system command is the 2-bit field in the flags byte selecting what a
//! frame means for its channel. Value `3` is reserved; frames carrying it
//! are rejected and the connection is torn down.

/// Frame system command
///
/// # Representation
///
/// Commands occupy bits 4-5 of the flags byte. The `#[repr(u8)]` ensures
/// stable numeric values for wire compatibility.
///
/// # Security
///
/// - **Reserved Value**: `from_bits` returns `None` for the reserved value
///   `3` rather than panicking. Frames with a reserved command must be
///   rejected with
///   [`ProtocolError::ReservedCommand`](crate::ProtocolError::ReservedCommand).
///
/// - **No Implicit Behavior**: Each command is explicitly handled by the
///   dispatcher. There is no "default" behavior for unknown commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SysCommand {
    /// Payload bytes for an established channel
    Data = 0,
    /// Open a new channel; payload is the initial payload (may be empty)
    OpenChannel = 1,
    /// Close a channel, or confirm a peer's close of one
    CloseChannel = 2,
}

impl SysCommand {
    /// Parse the 2-bit command field (if valid)
    #[must_use]
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::Data),
            1 => Some(Self::OpenChannel),
            2 => Some(Self::CloseChannel),
            _ => None,
        }
    }

    /// Convert to the 2-bit command field value
    #[must_use]
    pub const fn to_bits(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_round_trip() {
        for command in [SysCommand::Data, SysCommand::OpenChannel, SysCommand::CloseChannel] {
            assert_eq!(SysCommand::from_bits(command.to_bits()), Some(command));
        }
    }

    #[test]
    fn reserved_command_rejected() {
        assert_eq!(SysCommand::from_bits(3), None);
    }

    #[test]
    fn out_of_field_values_rejected() {
        // The caller masks the field to two bits; anything wider is a bug
        assert_eq!(SysCommand::from_bits(4), None);
        assert_eq!(SysCommand::from_bits(0xFF), None);
    }
}
