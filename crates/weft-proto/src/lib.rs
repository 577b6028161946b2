//! # Weft Protocol: Wire Format
//!
//! This crate implements the binary framing layer for the Weft channel
//! multiplexer. Weft layers many independent bidirectional byte-frame
//! channels over a single reliable, message-oriented transport; every
//! transport message carries exactly one frame for exactly one channel.
//!
//! ## Protocol Design
//!
//! The frame header is deliberately tiny - 3 or 7 bytes depending on the
//! channel id - because frames are per-payload overhead, not per-connection
//! overhead:
//!
//! ```text
//! byte 0:      flags (short-id bit, 2-bit system command, reserved bits)
//! bytes 1..2:  channel id, low 16 bits (little endian, always present)
//! bytes 3..6:  channel id, bits 16..47 (absent when the short-id bit is set)
//! bytes 7..:   opaque payload (possibly empty)
//! ```
//!
//! ## Implementation Notes
//!
//! - **Zero-Copy Payloads**: [`Frame::decode`] takes the inbound message as
//!   [`bytes::Bytes`] and returns the payload as a slice of that same
//!   buffer. No payload bytes are copied on the receive path.
//!
//! - **Single-Write Encoding**: [`Frame::to_bytes`] reserves
//!   [`Frame::HEADER_RESERVE`] bytes up front so the header is written once,
//!   immediately in front of the payload, with no later copy or shift.
//!
//! - **Explicit Validation**: Reserved flag bits and the reserved system
//!   command are rejected with typed errors; the caller decides that these
//!   are connection-fatal. There are no "unchecked" fast paths.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod command;
pub mod errors;
pub mod flags;
pub mod frame;

pub use command::SysCommand;
pub use errors::{ProtocolError, Result};
pub use flags::FrameFlags;
pub use frame::Frame;
