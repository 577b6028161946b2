//! Exhaustive positive space fuzzer for Frame encoding/decoding
//!
//! Unlike random fuzzing (frame_decode.rs), this fuzzer EXHAUSTIVELY tests
//! all combinations of:
//! - All system commands
//! - Edge-case channel ids (0, 1, both sides of the 16-bit header
//!   boundary, both sides of the 48-bit cap)
//! - Empty and small payloads, with and without the extension bit
//!
//! This ensures we don't miss bugs that occur only with specific
//! command+id combinations that random sampling might not hit.

#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use weft_proto::{Frame, SysCommand};

const ALL_COMMANDS: &[SysCommand] =
    &[SysCommand::Data, SysCommand::OpenChannel, SysCommand::CloseChannel];

// Edge-case values for the 48-bit channel id
const CHANNEL_IDS: &[u64] = &[
    0,
    1,
    2,
    3,
    0xFFFE,
    0xFFFF,                      // last short-header id
    0x1_0000,                    // first long-header id
    0x1_0001,
    Frame::CHANNEL_ID_LIMIT / 2, // mid-range
    Frame::CHANNEL_ID_LIMIT - 2,
    Frame::CHANNEL_ID_LIMIT - 1, // last encodable id
];

// Payload sizes to test
const PAYLOAD_SIZES: &[usize] = &[0, 1, 2, 7, 64, 1024];

fuzz_target!(|seed: &[u8]| {
    let fill = seed.first().copied().unwrap_or(0);

    for &command in ALL_COMMANDS {
        for &channel_id in CHANNEL_IDS {
            for &size in PAYLOAD_SIZES {
                for extension in [false, true] {
                    let frame = Frame {
                        command,
                        channel_id,
                        extension,
                        payload: Bytes::from(vec![fill; size]),
                    };

                    let wire = frame.to_bytes().expect("in-range frame must encode");

                    let expected_header = if channel_id < Frame::SHORT_ID_LIMIT { 3 } else { 7 };
                    assert_eq!(wire.len(), expected_header + size);

                    let parsed = Frame::decode(wire).expect("encoded frame must decode");
                    assert_eq!(parsed, frame);
                }
            }
        }
    }

    // The cap itself must refuse to encode
    let over = Frame::data(Frame::CHANNEL_ID_LIMIT, Bytes::new());
    assert!(over.to_bytes().is_err());
});
