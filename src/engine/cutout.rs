// src/engine/cutout.rs
//
// Chroma-key background removal.
//
// The reference color only selects which channel branches run: every channel that is
// >= the other two in the reference fires its branch. A branch clears a pixel when that
// channel is at least MIN_DOMINANT and beats half of
// (other two channels + BRANCH_OFFSET - tolerance of the channel).
// Fired branches are OR-ed; ties in the reference fire several at once.
// This is a heuristic, not a color-distance match.

use crate::engine::buffer::{PixelBuffer, Rgba, CHANNELS, TRANSPARENT};
use crate::engine::pool::{for_each_row, Parallelism};
use crate::ops::{CutoutColor, Tolerances};
use tracing::debug;

/// Dominant channel floor; darker pixels are never cleared.
pub const MIN_DOMINANT: i32 = 80;

const BRANCH_OFFSET: i32 = 50;

/// Which channel branches a reference color enables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DominantChannels {
    pub red: bool,
    pub green: bool,
    pub blue: bool,
}

impl DominantChannels {
    pub fn of(color: &CutoutColor) -> Self {
        let (r, g, b) = (color.red, color.green, color.blue);
        Self {
            red: r >= g && r >= b,
            green: g >= r && g >= b,
            blue: b >= r && b >= g,
        }
    }
}

#[inline]
fn branch_clears(dominant: i32, other_a: i32, other_b: i32, tolerance: i32) -> bool {
    // Widened so any i32 tolerance is in range
    let combined =
        i64::from(other_a) + i64::from(other_b) + i64::from(BRANCH_OFFSET) - i64::from(tolerance);
    // Integer division truncates toward zero, negative scores included
    dominant >= MIN_DOMINANT && combined / 2 < i64::from(dominant)
}

/// Decide whether `pixel` is background under the given branches and tolerances.
///
/// Pixel alpha is ignored.
pub fn classify_pixel(pixel: Rgba, branches: DominantChannels, tolerances: &Tolerances) -> bool {
    let r = pixel[0] as i32;
    let g = pixel[1] as i32;
    let b = pixel[2] as i32;

    (branches.green && branch_clears(g, r, b, tolerances.green))
        || (branches.blue && branch_clears(b, r, g, tolerances.blue))
        || (branches.red && branch_clears(r, g, b, tolerances.red))
}

/// Clear every background pixel of `buf` to fully transparent, in place.
///
/// Returns the number of cleared pixels.
pub fn remove_background(buf: &mut PixelBuffer, color: CutoutColor, tolerances: Tolerances) -> u64 {
    remove_background_with(buf, color, tolerances, &Parallelism::default())
}

pub fn remove_background_with(
    buf: &mut PixelBuffer,
    color: CutoutColor,
    tolerances: Tolerances,
    parallelism: &Parallelism,
) -> u64 {
    let branches = DominantChannels::of(&color);
    debug!(
        target: "image_manipulator::cutout",
        red = color.red,
        green = color.green,
        blue = color.blue,
        alpha = color.alpha,
        tolerance_red = tolerances.red,
        tolerance_green = tolerances.green,
        tolerance_blue = tolerances.blue,
        tolerance_alpha = tolerances.alpha,
        ?branches,
        "remove background"
    );

    let cleared = std::sync::atomic::AtomicU64::new(0);
    let stride = buf.stride();
    let pixel_count = buf.pixel_count();
    for_each_row(buf.as_raw_mut(), stride, pixel_count, parallelism, |_, row| {
        let mut row_cleared = 0u64;
        for px in row.chunks_exact_mut(CHANNELS) {
            if classify_pixel([px[0], px[1], px[2], px[3]], branches, &tolerances) {
                px.copy_from_slice(&TRANSPARENT);
                row_cleared += 1;
            }
        }
        cleared.fetch_add(row_cleared, std::sync::atomic::Ordering::Relaxed);
    });

    let cleared = cleared.into_inner();
    debug!(target: "image_manipulator::cutout", cleared, total = pixel_count, "background removed");
    cleared
}

/// Owned variant used by the pipeline: same dimensions out as in.
pub fn cutout(
    mut buf: PixelBuffer,
    color: CutoutColor,
    tolerances: Tolerances,
    parallelism: &Parallelism,
) -> PixelBuffer {
    remove_background_with(&mut buf, color, tolerances, parallelism);
    buf
}
