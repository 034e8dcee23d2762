// src/engine.rs
//
// The core of image-manipulator. A strictly sequential pipeline that:
// 1. Decodes the source into an owned RGBA buffer
// 2. Applies each action to the previous action's output
// 3. Encodes once and publishes the bytes under a unique name
//
// This file is a facade that delegates to the decomposed modules in engine/

// =============================================================================
// MODULE DECOMPOSITION
// =============================================================================

mod api;
mod buffer;
mod cutout;
mod decoder;
mod encoder;
mod geometry;
mod io;
mod pipeline;
mod pool;

// Re-export commonly used types and functions
pub use api::ImageManipulator;
pub use buffer::{PixelBuffer, Rgba, TRANSPARENT};
pub use cutout::{classify_pixel, cutout, remove_background, remove_background_with, DominantChannels, MIN_DOMINANT};
pub use decoder::{check_dimensions, decode_bytes, uri_to_path, FileDecoder, SourceDecoder};
pub use encoder::{encode_jpeg, encode_png, jpeg_smoothing, BufferEncoder, NativeEncoder};
pub use geometry::{calc_resize_dimensions, fast_resize_owned, flip, resize, rotate, rotate_with};
pub use io::{output_file_name, publish_output, OutputDescriptor};
pub use pipeline::{apply_action, apply_actions, apply_actions_with, crop, validate_crop};
pub use pool::{get_pool, Parallelism};
