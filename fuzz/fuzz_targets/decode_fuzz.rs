#![no_main]
use libfuzzer_sys::fuzz_target;
use javaser::stream::{DecodeOptions, decode_stream_with};

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must only ever produce errors, never panics.
    let _ = decode_stream_with(data, DecodeOptions { max_depth: 128 });

    // Most inputs fail the header check, so also try them as a stream body.
    let mut framed = vec![0xAC, 0xED, 0x00, 0x05];
    framed.extend_from_slice(data);
    if let Ok(stream) = decode_stream_with(&framed, DecodeOptions { max_depth: 128 }) {
        let _ = stream.to_json_all();
    }
});
