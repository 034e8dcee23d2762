#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use image_manipulator::engine::apply_actions;
use image_manipulator::{Action, CutoutColor, PixelBuffer, Tolerances};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct ActionSeed {
    kind: u8,
    a: i32,
    b: i32,
    c: i32,
    d: i32,
}

fn build_buffer(data: &[u8]) -> Option<PixelBuffer> {
    let width = data.first().copied().unwrap_or(0) as u32 % 64 + 1;
    let height = data.get(1).copied().unwrap_or(0) as u32 % 64 + 1;
    PixelBuffer::from_fn(width, height, |x, y| {
        let i = (y * width + x) as usize * 4;
        let byte = |k: usize| data.get((i + k) % data.len()).copied().unwrap_or(0);
        [byte(0), byte(1), byte(2), byte(3)]
    })
    .ok()
}

fn seeds_to_actions(seeds: Vec<ActionSeed>) -> Vec<Action> {
    seeds
        .into_iter()
        .take(16)
        .map(|seed| match seed.kind % 5 {
            0 => Action::Resize {
                width: (seed.a % 3 != 0).then(|| seed.b.clamp(0, 512) as u32),
                height: (seed.a % 2 != 0).then(|| seed.c.clamp(0, 512) as u32),
            },
            1 => Action::Crop {
                x: seed.a.max(0) as u32,
                y: seed.b.max(0) as u32,
                width: seed.c.max(0) as u32,
                height: seed.d.max(0) as u32,
            },
            2 => Action::Rotate { degrees: seed.a },
            3 => Action::Flip {
                horizontal: seed.a & 1 == 1,
                vertical: seed.a & 2 == 2,
            },
            _ => Action::Cutout {
                color: CutoutColor::rgb(seed.a as u8, seed.b as u8, seed.c as u8),
                tolerances: Tolerances::uniform(seed.d),
            },
        })
        .collect()
}

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let mut unstructured = Unstructured::new(data);
    let seeds: Vec<ActionSeed> = match Vec::arbitrary(&mut unstructured) {
        Ok(v) => v,
        Err(_) => return,
    };

    let Some(buf) = build_buffer(data) else {
        return;
    };
    // Errors are expected for invalid crops/resizes; only panics matter here.
    if let Ok(out) = apply_actions(buf, &seeds_to_actions(seeds)) {
        assert_eq!(out.as_raw().len() as u64, out.pixel_count() * 4);
    }
});
