#![no_main]

use image_manipulator::{parse_actions, parse_save_options};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let _ = parse_actions(text);
    if let Ok(save) = parse_save_options(text) {
        assert!(save.quality_percent() <= 100);
    }
});
