// src/engine/buffer.rs
//
// Owned RGBA8 pixel store. Every geometry op consumes one buffer and returns a new one;
// only cutout mutates in place.

use crate::error::{ManipulatorError, Result};
use image::{DynamicImage, RgbaImage};

/// One pixel, `[r, g, b, a]`.
pub type Rgba = [u8; 4];

pub(crate) const CHANNELS: usize = 4;

pub const TRANSPARENT: Rgba = [0, 0, 0, 0];

/// Width, height and a flat row-major RGBA store of exactly `width * height` pixels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap raw RGBA8 bytes. Fails unless `data.len() == width * height * 4`.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = byte_len(width, height)?;
        if data.len() != expected {
            return Err(ManipulatorError::invalid_buffer(
                width,
                height,
                expected,
                data.len(),
            ));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A buffer filled with a single color.
    pub fn filled(width: u32, height: u32, color: Rgba) -> Result<Self> {
        let expected = byte_len(width, height)?;
        let mut data = Vec::with_capacity(expected);
        for _ in 0..expected / CHANNELS {
            data.extend_from_slice(&color);
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> Rgba) -> Result<Self> {
        let expected = byte_len(width, height)?;
        let mut data = Vec::with_capacity(expected);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&f(x, y));
            }
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// Row stride in bytes
    pub(crate) fn stride(&self) -> usize {
        self.width as usize * CHANNELS
    }

    fn offset(&self, x: u32, y: u32) -> Result<usize> {
        if x >= self.width || y >= self.height {
            return Err(ManipulatorError::out_of_bounds(
                x,
                y,
                self.width,
                self.height,
            ));
        }
        Ok((y as usize * self.width as usize + x as usize) * CHANNELS)
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> Result<Rgba> {
        let i = self.offset(x, y)?;
        Ok([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ])
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, pixel: Rgba) -> Result<()> {
        let i = self.offset(x, y)?;
        self.data[i..i + CHANNELS].copy_from_slice(&pixel);
        Ok(())
    }

    /// Copy the `width x height` region starting at `(x, y)` into a new buffer.
    ///
    /// The region must lie entirely inside this buffer; range checks against
    /// caller intent (crop rules) live in the pipeline.
    pub fn copy_region(&self, x: u32, y: u32, width: u32, height: u32) -> Result<Self> {
        let right = x as u64 + width as u64;
        let bottom = y as u64 + height as u64;
        if right > self.width as u64 || bottom > self.height as u64 {
            return Err(ManipulatorError::out_of_bounds(
                right.min(u32::MAX as u64) as u32,
                bottom.min(u32::MAX as u64) as u32,
                self.width,
                self.height,
            ));
        }

        let row_bytes = width as usize * CHANNELS;
        let mut data = Vec::with_capacity(row_bytes * height as usize);
        let stride = self.stride();
        for row in y..y + height {
            let start = row as usize * stride + x as usize * CHANNELS;
            data.extend_from_slice(&self.data[start..start + row_bytes]);
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn into_rgba_image(self) -> Result<RgbaImage> {
        let (width, height) = (self.width, self.height);
        let actual = self.data.len();
        RgbaImage::from_raw(width, height, self.data).ok_or_else(|| {
            ManipulatorError::invalid_buffer(width, height, actual, actual)
        })
    }

    pub fn to_dynamic_image(&self) -> Result<DynamicImage> {
        Ok(DynamicImage::ImageRgba8(self.clone().into_rgba_image()?))
    }
}

impl From<RgbaImage> for PixelBuffer {
    fn from(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            data: image.into_raw(),
        }
    }
}

impl From<DynamicImage> for PixelBuffer {
    fn from(image: DynamicImage) -> Self {
        match image {
            DynamicImage::ImageRgba8(rgba) => rgba.into(),
            other => other.to_rgba8().into(),
        }
    }
}

fn byte_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(CHANNELS))
        .ok_or_else(|| {
            ManipulatorError::pixel_count_exceeds_limit(
                width as u64 * height as u64,
                (usize::MAX / CHANNELS) as u64,
            )
        })
}
