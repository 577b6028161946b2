//! Frame flags for the Weft protocol.
//!
//! The flags byte is the first byte of every frame. It carries the short-id
//! marker, the 2-bit system command, and reserved bits split into a breaking
//! set (reject the connection) and a single non-breaking extension bit
//! (warn and continue).

use bitflags::bitflags;

bitflags! {
    /// Frame flags byte (8 bits)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FrameFlags: u8 {
        /// Channel id fits in 16 bits; the header is 3 bytes instead of 7
        const SHORT_ID = 0b0000_0010;

        /// Low bit of the 2-bit system command field
        const COMMAND_LO = 0b0001_0000;

        /// High bit of the 2-bit system command field
        const COMMAND_HI = 0b0010_0000;

        /// Non-breaking extension bit; processed frames may carry it
        const EXTENSION = 0b1000_0000;
    }
}

impl FrameFlags {
    /// All reserved bits, breaking and non-breaking combined
    pub const RESERVED_MASK: u8 = 0xCD;

    /// Reserved bits whose presence on an inbound frame is a fatal
    /// protocol error (everything reserved except [`FrameFlags::EXTENSION`])
    pub const BREAKING_MASK: u8 = Self::RESERVED_MASK & !Self::EXTENSION.bits();

    /// Mask covering the 2-bit system command field
    pub const COMMAND_MASK: u8 = Self::COMMAND_LO.bits() | Self::COMMAND_HI.bits();

    /// Bit position of the system command field within the flags byte
    pub const COMMAND_SHIFT: u32 = 4;

    /// Create flags from a raw byte value
    ///
    /// This function is **infallible** because every byte value is a valid
    /// flags byte at this layer. Reserved-bit policy (fatal vs. warning) is
    /// enforced by the frame decoder, not here.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        Self::from_bits_retain(byte)
    }

    /// Convert to the raw byte value
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        self.bits()
    }

    /// Extract the 2-bit system command field (0..=3)
    #[must_use]
    pub const fn command_bits(self) -> u8 {
        (self.bits() & Self::COMMAND_MASK) >> Self::COMMAND_SHIFT
    }

    /// True if any breaking reserved bit is set
    #[must_use]
    pub const fn has_breaking_bits(self) -> bool {
        self.bits() & Self::BREAKING_MASK != 0
    }
}

impl Default for FrameFlags {
    fn default() -> Self {
        Self::empty()
    }
}
