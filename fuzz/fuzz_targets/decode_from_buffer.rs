#![no_main]

use image_manipulator::engine::decode_bytes;
use libfuzzer_sys::fuzz_target;

// Small limits keep hostile headers from allocating huge buffers
const MAX_DIMENSION: u32 = 4096;
const MAX_PIXELS: u64 = 4_000_000;

fuzz_target!(|data: &[u8]| {
    if let Ok(buf) = decode_bytes(data, MAX_DIMENSION, MAX_PIXELS) {
        assert_eq!(buf.as_raw().len() as u64, buf.pixel_count() * 4);
    }
});
