//! Random-input fuzzer for Frame decoding
//!
//! Feeds arbitrary bytes into the decoder. Two properties must hold:
//! - Decoding never panics, whatever the input
//! - Anything that decodes re-encodes to an equivalent frame (the encoder
//!   may shrink the representation only by picking the short header, which
//!   the decoder maps back to the same frame)

#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use weft_proto::Frame;

fuzz_target!(|data: &[u8]| {
    let Ok(frame) = Frame::decode(Bytes::copy_from_slice(data)) else {
        return;
    };

    let wire = frame.to_bytes().expect("decoded frame must re-encode");
    let reparsed = Frame::decode(wire).expect("re-encoded frame must decode");

    assert_eq!(frame.command, reparsed.command);
    assert_eq!(frame.channel_id, reparsed.channel_id);
    assert_eq!(frame.extension, reparsed.extension);
    assert_eq!(frame.payload, reparsed.payload);
});
