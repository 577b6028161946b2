//! Frame type combining the bit-packed header and an opaque payload.
//!
//! A `Frame` is the transport-layer unit: one transport message carries one
//! frame for exactly one channel. The header is 3 bytes when the channel id
//! fits in 16 bits and 7 bytes otherwise; everything after the header is the
//! payload, delivered verbatim.
//!
//! This is a pure data holder plus codec. Channel lifecycle rules (who may
//! open which ids, what a close means) live in `weft-core`.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    FrameFlags, SysCommand,
    errors::{ProtocolError, Result},
};

/// Complete protocol frame
///
/// Layout on the wire (multi-byte fields little endian):
///
/// `[flags: 1 byte] [channel id low 16] [channel id bits 16..47, long header
/// only] [payload: variable]`
///
/// # Invariants
///
/// - **Id Range**: `channel_id` MUST fit in 48 bits. Violations are rejected
///   by [`Frame::encode`]; [`Frame::decode`] cannot produce one.
///
/// - **Header Choice**: The short header is used iff
///   `channel_id < `[`Frame::SHORT_ID_LIMIT`]. This is enforced on encode
///   and assumed on decode, so `decode(encode(f)) == f` for every valid
///   frame.
///
/// # Security
///
/// This struct provides **structural validity** only: valid flags, a valid
/// system command, and a payload that is simply the rest of the message.
/// Whether the channel id refers to a live channel is checked by the
/// multiplexer's dispatch, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// What this frame means for its channel
    pub command: SysCommand,

    /// 48-bit channel id
    pub channel_id: u64,

    /// Non-breaking extension bit observed on (or to set in) the flags byte
    pub extension: bool,

    /// Opaque payload bytes (may be empty)
    pub payload: Bytes,
}

impl Frame {
    /// Header length when the channel id fits in 16 bits
    pub const SHORT_HEADER: usize = 3;

    /// Header length for the full 48-bit channel id
    pub const LONG_HEADER: usize = 7;

    /// Bytes to reserve in front of a payload so any header fits without a
    /// later copy (the maximum header length)
    pub const HEADER_RESERVE: usize = Self::LONG_HEADER;

    /// First channel id that requires the long header
    pub const SHORT_ID_LIMIT: u64 = 1 << 16;

    /// Exclusive upper bound of the channel id space
    pub const CHANNEL_ID_LIMIT: u64 = 1 << 48;

    /// Create a data frame carrying payload bytes for a channel
    #[must_use]
    pub fn data(channel_id: u64, payload: impl Into<Bytes>) -> Self {
        Self { command: SysCommand::Data, channel_id, extension: false, payload: payload.into() }
    }

    /// Create an open-channel frame; the payload is the initial payload
    #[must_use]
    pub fn open(channel_id: u64, payload: impl Into<Bytes>) -> Self {
        Self {
            command: SysCommand::OpenChannel,
            channel_id,
            extension: false,
            payload: payload.into(),
        }
    }

    /// Create a close-channel frame (close request or close confirmation)
    #[must_use]
    pub fn close_channel(channel_id: u64) -> Self {
        Self {
            command: SysCommand::CloseChannel,
            channel_id,
            extension: false,
            payload: Bytes::new(),
        }
    }

    /// Header length this frame encodes with (3 or 7)
    #[must_use]
    pub fn header_len(&self) -> usize {
        if self.channel_id < Self::SHORT_ID_LIMIT { Self::SHORT_HEADER } else { Self::LONG_HEADER }
    }

    /// Total encoded length (header plus payload)
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        self.header_len() + self.payload.len()
    }

    /// Encode the frame into a buffer
    ///
    /// Writes the 3- or 7-byte header followed by the payload. The short
    /// header is selected automatically from the channel id.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::ChannelIdOutOfRange`] if the channel id does
    /// not fit in 48 bits.
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        if self.channel_id >= Self::CHANNEL_ID_LIMIT {
            return Err(ProtocolError::ChannelIdOutOfRange { id: self.channel_id });
        }

        let short = self.channel_id < Self::SHORT_ID_LIMIT;

        let mut flags = self.command.to_bits() << FrameFlags::COMMAND_SHIFT;
        if short {
            flags |= FrameFlags::SHORT_ID.bits();
        }
        if self.extension {
            flags |= FrameFlags::EXTENSION.bits();
        }

        dst.put_u8(flags);
        #[allow(clippy::cast_possible_truncation)]
        dst.put_u16_le(self.channel_id as u16);
        if !short {
            #[allow(clippy::cast_possible_truncation)]
            dst.put_u32_le((self.channel_id >> 16) as u32);
        }
        dst.put_slice(&self.payload);

        Ok(())
    }

    /// Encode into a freshly allocated buffer sized in one step
    ///
    /// Reserves [`Frame::HEADER_RESERVE`] plus the payload length so the
    /// header lands immediately in front of the payload with no later copy.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Frame::encode`].
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(Self::HEADER_RESERVE + self.payload.len());
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Decode a frame from one inbound transport message
    ///
    /// The payload of the returned frame is a zero-copy slice of `message`
    /// starting immediately after the header.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::ShortFrame`] if the message has fewer bytes than
    ///   its header demands (an empty message and a 1-byte message are both
    ///   short: even the short header is 3 bytes).
    /// - [`ProtocolError::ReservedBits`] if any breaking reserved flag bit
    ///   is set. The non-breaking extension bit is *not* an error; it is
    ///   surfaced as [`Frame::extension`] for the caller to log.
    /// - [`ProtocolError::ReservedCommand`] if the system command field
    ///   holds the reserved value.
    pub fn decode(message: Bytes) -> Result<Self> {
        let Some(&flags_byte) = message.first() else {
            return Err(ProtocolError::ShortFrame { expected: Self::SHORT_HEADER, actual: 0 });
        };

        let flags = FrameFlags::from_byte(flags_byte);

        if flags.has_breaking_bits() {
            return Err(ProtocolError::ReservedBits { flags: flags_byte });
        }

        let command = SysCommand::from_bits(flags.command_bits())
            .ok_or(ProtocolError::ReservedCommand { flags: flags_byte })?;

        let header_len =
            if flags.contains(FrameFlags::SHORT_ID) { Self::SHORT_HEADER } else { Self::LONG_HEADER };

        if message.len() < header_len {
            return Err(ProtocolError::ShortFrame { expected: header_len, actual: message.len() });
        }

        let low = u64::from(u16::from_le_bytes([message[1], message[2]]));
        let channel_id = if header_len == Self::SHORT_HEADER {
            low
        } else {
            let high =
                u64::from(u32::from_le_bytes([message[3], message[4], message[5], message[6]]));
            low | (high << 16)
        };

        Ok(Self {
            command,
            channel_id,
            extension: flags.contains(FrameFlags::EXTENSION),
            payload: message.slice(header_len..),
        })
    }
}
