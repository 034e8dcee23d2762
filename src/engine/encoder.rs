// src/engine/encoder.rs
//
// Encoder operations: JPEG (mozjpeg) and PNG (image + oxipng)

use crate::engine::buffer::PixelBuffer;
use crate::error::{ManipulatorError, Result};
use crate::ops::OutputFormat;
use image::{DynamicImage, ImageFormat, RgbImage};
use mozjpeg::{ColorSpace, Compress, ScanMode};
use std::io::Cursor;
use tracing::debug;

// Type alias for Result - always use ManipulatorError to preserve error taxonomy
type EncoderResult<T> = Result<T>;

/// Turns the final buffer into file bytes.
///
/// The manipulator owns one boxed encoder; swap it to change codecs or to
/// observe what gets encoded in tests.
pub trait BufferEncoder: Send + Sync {
    /// `quality` is 0-100. Formats without a quality knob ignore it.
    fn encode(&self, buf: &PixelBuffer, format: OutputFormat, quality: u8) -> EncoderResult<Vec<u8>>;
}

/// mozjpeg for JPEG, image + oxipng for PNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeEncoder;

impl BufferEncoder for NativeEncoder {
    fn encode(&self, buf: &PixelBuffer, format: OutputFormat, quality: u8) -> EncoderResult<Vec<u8>> {
        let (width, height) = buf.dimensions();
        if width == 0 || height == 0 {
            return Err(ManipulatorError::encode_failed(
                format.as_str(),
                format!("cannot encode empty {width}x{height} image"),
            ));
        }

        let encoded = match format {
            OutputFormat::Jpeg => encode_jpeg(buf, quality)?,
            OutputFormat::Png => encode_png(buf)?,
        };
        debug!(
            target: "image_manipulator::io",
            format = format.as_str(),
            quality,
            width,
            height,
            bytes = encoded.len(),
            "encoded"
        );
        Ok(encoded)
    }
}

/// JPEG smoothing factor for a 0-100 quality.
/// Lower qualities get more smoothing to hide blocking.
pub fn jpeg_smoothing(quality: u8) -> u8 {
    match quality {
        90.. => 0,
        70..=89 => 5,
        60..=69 => 10,
        _ => 18,
    }
}

/// Encode to JPEG using mozjpeg. Alpha is dropped; transparent pixels come out black.
pub fn encode_jpeg(buf: &PixelBuffer, quality: u8) -> EncoderResult<Vec<u8>> {
    let quality = quality.min(100);
    let rgb: RgbImage = buf.to_dynamic_image()?.to_rgb8();
    let (w, h) = rgb.dimensions();
    let pixels: &[u8] = rgb.as_raw();

    let mut comp = Compress::new(ColorSpace::JCS_RGB);
    comp.set_size(w as usize, h as usize);
    comp.set_color_space(ColorSpace::JCS_YCbCr);
    comp.set_quality(quality as f32);

    comp.set_chroma_sampling_pixel_sizes((2, 2), (2, 2));
    comp.set_progressive_mode();
    comp.set_optimize_coding(true);
    comp.set_optimize_scans(true);
    comp.set_scan_optimization_mode(ScanMode::AllComponentsTogether);
    comp.set_smoothing_factor(jpeg_smoothing(quality));

    let estimated_size = (w as usize * h as usize * 3 / 10).max(4096);
    let mut output = Vec::with_capacity(estimated_size);

    {
        let mut writer = comp.start_compress(&mut output).map_err(|e| {
            ManipulatorError::encode_failed("jpeg", format!("mozjpeg: failed to start compress: {e:?}"))
        })?;

        let stride = w as usize * 3;
        for row in pixels.chunks(stride) {
            writer.write_scanlines(row).map_err(|e| {
                ManipulatorError::encode_failed(
                    "jpeg",
                    format!("mozjpeg: failed to write scanlines: {e:?}"),
                )
            })?;
        }

        writer.finish().map_err(|e| {
            ManipulatorError::encode_failed("jpeg", format!("mozjpeg: failed to finish: {e:?}"))
        })?;
    }

    Ok(output)
}

/// Encode to PNG with the image crate, then recompress losslessly with oxipng.
pub fn encode_png(buf: &PixelBuffer) -> EncoderResult<Vec<u8>> {
    let img = DynamicImage::ImageRgba8(buf.clone().into_rgba_image()?);
    let mut raw = Vec::new();
    img.write_to(&mut Cursor::new(&mut raw), ImageFormat::Png)
        .map_err(|e| ManipulatorError::encode_failed("png", format!("PNG encode failed: {e}")))?;

    let mut options = oxipng::Options::from_preset(4);
    options.strip = oxipng::StripChunks::None;

    oxipng::optimize_from_memory(&raw, &options).map_err(|e| {
        ManipulatorError::encode_failed("png", format!("oxipng optimization failed: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_buffer(width: u32, height: u32) -> PixelBuffer {
        PixelBuffer::from_fn(width, height, |x, y| {
            [(x * 7 % 256) as u8, (y * 11 % 256) as u8, 128, 255]
        })
        .unwrap()
    }

    mod jpeg_tests {
        use super::*;

        #[test]
        fn test_encode_jpeg_produces_valid_jpeg() {
            let result = encode_jpeg(&create_test_buffer(64, 48), 80).unwrap();
            assert_eq!(&result[0..2], &[0xFF, 0xD8]);
            assert_eq!(&result[result.len() - 2..], &[0xFF, 0xD9]);

            let decoded = image::load_from_memory(&result).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (64, 48));
        }

        #[test]
        fn test_encode_jpeg_quality_affects_size() {
            let buf = create_test_buffer(128, 128);
            let low = encode_jpeg(&buf, 10).unwrap();
            let high = encode_jpeg(&buf, 100).unwrap();
            assert!(low.len() < high.len());
        }

        #[test]
        fn test_transparent_pixels_encode() {
            let buf = PixelBuffer::filled(16, 16, [0, 0, 0, 0]).unwrap();
            let result = encode_jpeg(&buf, 90).unwrap();
            let decoded = image::load_from_memory(&result).unwrap().to_rgb8();
            assert!(decoded.pixels().all(|p| p.0.iter().all(|&c| c < 8)));
        }

        #[test]
        fn test_smoothing_bands() {
            assert_eq!(jpeg_smoothing(100), 0);
            assert_eq!(jpeg_smoothing(90), 0);
            assert_eq!(jpeg_smoothing(89), 5);
            assert_eq!(jpeg_smoothing(60), 10);
            assert_eq!(jpeg_smoothing(0), 18);
        }
    }

    mod png_tests {
        use super::*;

        #[test]
        fn test_encode_png_is_lossless_with_alpha() {
            let buf = PixelBuffer::from_fn(9, 5, |x, y| [x as u8 * 20, y as u8 * 40, 3, (x * y) as u8])
                .unwrap();
            let result = encode_png(&buf).unwrap();
            assert_eq!(&result[0..4], &[0x89, 0x50, 0x4E, 0x47]);

            let decoded = image::load_from_memory(&result).unwrap().to_rgba8();
            assert_eq!(decoded.as_raw(), buf.as_raw());
        }
    }

    mod native_encoder_tests {
        use super::*;

        #[test]
        fn test_dispatch_by_format() {
            let buf = create_test_buffer(8, 8);
            let jpeg = NativeEncoder.encode(&buf, OutputFormat::Jpeg, 90).unwrap();
            let png = NativeEncoder.encode(&buf, OutputFormat::Png, 90).unwrap();
            assert_eq!(image::guess_format(&jpeg).unwrap(), ImageFormat::Jpeg);
            assert_eq!(image::guess_format(&png).unwrap(), ImageFormat::Png);
        }

        #[test]
        fn test_empty_buffer_is_rejected() {
            let buf = PixelBuffer::from_raw(0, 4, Vec::new()).unwrap();
            let err = NativeEncoder.encode(&buf, OutputFormat::Png, 100).unwrap_err();
            assert_eq!(err.code(), "E_ENCODE_ERR");
        }
    }
}
