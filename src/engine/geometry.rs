// src/engine/geometry.rs
//
// Geometry operations: resize, rotate, flip. Each consumes a buffer and returns a new one.

use crate::engine::buffer::{PixelBuffer, TRANSPARENT};
use crate::engine::pool::{install, Parallelism};
use crate::error::{ManipulatorError, Result};
use fast_image_resize::{self as fir, MulDiv, PixelType, ResizeOptions};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};

/// Calculate resize dimensions.
///
/// One side given: the other follows the source aspect ratio (`width / height`), rounded.
/// Both given: used as-is. Neither: `(0, 0)`, which resize rejects.
pub fn calc_resize_dimensions(
    orig_w: u32,
    orig_h: u32,
    target_w: Option<u32>,
    target_h: Option<u32>,
) -> (u32, u32) {
    let ratio = orig_w as f64 / orig_h as f64;
    match (target_w, target_h) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, round_dimension(w as f64 / ratio)),
        (None, Some(h)) => (round_dimension(ratio * h as f64), h),
        (None, None) => (0, 0),
    }
}

fn round_dimension(value: f64) -> u32 {
    if value.is_finite() {
        value.round().clamp(0.0, u32::MAX as f64) as u32
    } else {
        0
    }
}

/// Scale the buffer with bilinear resampling.
pub fn resize(buf: PixelBuffer, width: Option<u32>, height: Option<u32>) -> Result<PixelBuffer> {
    let (src_w, src_h) = buf.dimensions();
    if src_w == 0 || src_h == 0 {
        return Err(ManipulatorError::invalid_dimensions(
            (width.unwrap_or(0) as i64, height.unwrap_or(0) as i64),
            (src_w, src_h),
        ));
    }

    let (w, h) = calc_resize_dimensions(src_w, src_h, width, height);
    if w == 0 || h == 0 {
        return Err(ManipulatorError::invalid_dimensions(
            (w as i64, h as i64),
            (src_w, src_h),
        ));
    }

    if (w, h) == (src_w, src_h) {
        return Ok(buf);
    }
    fast_resize_owned(buf, w, h)
}

fn default_resize_options() -> ResizeOptions {
    ResizeOptions::new().resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Bilinear))
}

/// Resize with fast_image_resize, falling back to the image crate if fir rejects the buffer.
pub fn fast_resize_owned(buf: PixelBuffer, dst_width: u32, dst_height: u32) -> Result<PixelBuffer> {
    let (src_width, src_height) = buf.dimensions();
    let mut src_pixels = buf.into_raw();

    let primary = match fir::images::Image::from_slice_u8(
        src_width,
        src_height,
        src_pixels.as_mut_slice(),
        PixelType::U8x4,
    ) {
        Ok(src_image) => resize_with_source_image(src_image, dst_width, dst_height),
        Err(e) => Err(format!("fir source image error: {e:?}")),
    };

    let pixels = match primary {
        Ok(pixels) => pixels,
        Err(err) => resize_with_image_crate_fallback(
            src_pixels,
            src_width,
            src_height,
            dst_width,
            dst_height,
        )
        .map_err(|fallback_err| {
            ManipulatorError::resize_failed(
                (src_width, src_height),
                (dst_width, dst_height),
                format!("{err}; image crate fallback failed: {fallback_err}"),
            )
        })?,
    };

    PixelBuffer::from_raw(dst_width, dst_height, pixels)
}

/// Check if an RGBA buffer is fully opaque (all alpha values are 255)
fn is_fully_opaque(image: &fir::images::Image) -> bool {
    image.buffer().iter().skip(3).step_by(4).all(|&alpha| alpha == 255)
}

fn resize_with_source_image(
    mut src_image: fir::images::Image<'_>,
    dst_width: u32,
    dst_height: u32,
) -> std::result::Result<Vec<u8>, String> {
    let mut dst_image = fir::images::Image::new(dst_width, dst_height, PixelType::U8x4);

    // Transparent regions (e.g. after cutout) must not bleed their RGB into neighbours.
    let needs_premultiply = !is_fully_opaque(&src_image);

    let mul_div = MulDiv::default();
    if needs_premultiply {
        mul_div
            .multiply_alpha_inplace(&mut src_image)
            .map_err(|e| format!("failed to premultiply alpha: {e}"))?;
    }

    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_image, &mut dst_image, &default_resize_options())
        .map_err(|e| format!("fir resize error: {e:?}"))?;

    if needs_premultiply {
        mul_div
            .divide_alpha_inplace(&mut dst_image)
            .map_err(|e| format!("failed to unpremultiply alpha: {e}"))?;
    }

    Ok(dst_image.into_vec())
}

fn resize_with_image_crate_fallback(
    src_pixels: Vec<u8>,
    src_width: u32,
    src_height: u32,
    dst_width: u32,
    dst_height: u32,
) -> std::result::Result<Vec<u8>, String> {
    let rgba = RgbaImage::from_raw(src_width, src_height, src_pixels)
        .ok_or_else(|| "failed to build rgba image for fallback resize".to_string())?;
    Ok(imageops::resize(&rgba, dst_width, dst_height, FilterType::Triangle).into_raw())
}

/// Rotate clockwise by `degrees` around the buffer center.
///
/// The output keeps the input bounds: corners rotated out are clipped and
/// uncovered areas become transparent. Arbitrary angles resample bilinearly;
/// half turns, and quarter turns of square buffers, move pixels exactly.
pub fn rotate(buf: PixelBuffer, degrees: i32) -> Result<PixelBuffer> {
    rotate_with(buf, degrees, &Parallelism::default())
}

pub fn rotate_with(buf: PixelBuffer, degrees: i32, parallelism: &Parallelism) -> Result<PixelBuffer> {
    let normalized = degrees.rem_euclid(360);
    if normalized == 0 || buf.pixel_count() == 0 {
        return Ok(buf);
    }

    let square = buf.width() == buf.height();
    let pixel_count = buf.pixel_count();
    let img = buf.into_rgba_image()?;
    let rotated = match normalized {
        180 => imageops::rotate180(&img),
        90 if square => imageops::rotate90(&img),
        270 if square => imageops::rotate270(&img),
        _ => {
            let theta = (normalized as f32).to_radians();
            install(pixel_count, parallelism, || {
                rotate_about_center(&img, theta, Interpolation::Bilinear, Rgba(TRANSPARENT))
            })
        }
    };
    Ok(rotated.into())
}

/// Mirror the buffer. With both flags false the buffer is returned unchanged.
pub fn flip(buf: PixelBuffer, horizontal: bool, vertical: bool) -> Result<PixelBuffer> {
    if !horizontal && !vertical {
        return Ok(buf);
    }
    let mut img = buf.into_rgba_image()?;
    if horizontal {
        imageops::flip_horizontal_in_place(&mut img);
    }
    if vertical {
        imageops::flip_vertical_in_place(&mut img);
    }
    Ok(img.into())
}
