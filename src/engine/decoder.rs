// src/engine/decoder.rs
//
// Decoder operations: turn a source URI into an RGBA PixelBuffer.

use crate::config::ManipulatorConfig;
use crate::engine::buffer::PixelBuffer;
use crate::error::{ManipulatorError, Result};
use image::{DynamicImage, ImageReader};
use std::io::Cursor;
use std::path::PathBuf;
use tracing::debug;

// Type alias for Result - always use ManipulatorError to preserve error taxonomy
type DecoderResult<T> = Result<T>;

const FILE_SCHEME: &str = "file://";

/// Produces the first buffer of a run from the caller's URI.
pub trait SourceDecoder: Send + Sync {
    fn decode(&self, uri: &str) -> DecoderResult<PixelBuffer>;
}

/// Decodes local files (plain paths or `file://` URIs) with the image crate.
#[derive(Clone, Debug)]
pub struct FileDecoder {
    max_dimension: u32,
    max_pixels: u64,
}

impl FileDecoder {
    pub fn new(max_dimension: u32, max_pixels: u64) -> Self {
        Self {
            max_dimension,
            max_pixels,
        }
    }
}

impl Default for FileDecoder {
    fn default() -> Self {
        Self::from(&ManipulatorConfig::default())
    }
}

impl From<&ManipulatorConfig> for FileDecoder {
    fn from(config: &ManipulatorConfig) -> Self {
        Self::new(config.max_dimension, config.max_pixels)
    }
}

impl SourceDecoder for FileDecoder {
    fn decode(&self, uri: &str) -> DecoderResult<PixelBuffer> {
        let path = uri_to_path(uri);
        let bytes = std::fs::read(&path)
            .map_err(|e| ManipulatorError::decode_failed(uri.to_string(), Some(e.to_string())))?;
        let buf = decode_bytes(&bytes, self.max_dimension, self.max_pixels)
            .map_err(|e| match e {
                ManipulatorError::DecodeFailed { cause, .. } => ManipulatorError::DecodeFailed {
                    uri: uri.to_string().into(),
                    cause,
                },
                other => other,
            })?;
        debug!(
            target: "image_manipulator::io",
            uri,
            width = buf.width(),
            height = buf.height(),
            "decoded source"
        );
        Ok(buf)
    }
}

/// Strip a `file://` scheme; anything else is taken as a filesystem path.
pub fn uri_to_path(uri: &str) -> PathBuf {
    PathBuf::from(uri.strip_prefix(FILE_SCHEME).unwrap_or(uri))
}

/// Decode encoded image bytes, rejecting oversized images before pixels are allocated.
pub fn decode_bytes(bytes: &[u8], max_dimension: u32, max_pixels: u64) -> DecoderResult<PixelBuffer> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ManipulatorError::decode_failed("<memory>", Some(e.to_string())))?;
    if reader.format().is_none() {
        return Err(ManipulatorError::decode_failed(
            "<memory>",
            Some("unrecognized image format"),
        ));
    }

    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| ManipulatorError::decode_failed("<memory>", Some(e.to_string())))?;
    check_dimensions(width, height, max_dimension, max_pixels)?;

    let img = image::load_from_memory(bytes)
        .map_err(|e| ManipulatorError::decode_failed("<memory>", Some(e.to_string())))?;
    let img = match detect_exif_orientation(bytes) {
        Some(orientation) => {
            debug!(target: "image_manipulator::io", orientation, "applying EXIF orientation");
            apply_orientation(img, orientation)
        }
        None => img,
    };
    Ok(PixelBuffer::from(img))
}

/// Extract the EXIF Orientation tag (1-8). Returns None if missing or invalid.
pub fn detect_exif_orientation(bytes: &[u8]) -> Option<u16> {
    let mut cursor = Cursor::new(bytes);
    let exif = exif::Reader::new().read_from_container(&mut cursor).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    // Short or Long depending on the writer
    let orientation = u16::try_from(field.value.get_uint(0)?).ok()?;
    (1..=8).contains(&orientation).then_some(orientation)
}

/// Turn pixels stored in EXIF `orientation` into upright display order.
pub fn apply_orientation(img: DynamicImage, orientation: u16) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),  // transpose
        6 => img.rotate90(),
        7 => img.rotate270().fliph(), // transverse
        8 => img.rotate270(),
        _ => img,
    }
}

pub fn check_dimensions(
    width: u32,
    height: u32,
    max_dimension: u32,
    max_pixels: u64,
) -> DecoderResult<()> {
    if width > max_dimension || height > max_dimension {
        return Err(ManipulatorError::dimension_exceeds_limit(
            width.max(height),
            max_dimension,
        ));
    }
    let pixels = width as u64 * height as u64;
    if pixels > max_pixels {
        return Err(ManipulatorError::pixel_count_exceeds_limit(pixels, max_pixels));
    }
    Ok(())
}
