// lib.rs
//
// image-manipulator: decode an image, run an ordered list of edits over its
// pixels, and publish the encoded result.
//
// Design goals:
// - One owned RGBA buffer flows through the pipeline
// - Deterministic per-pixel algorithms (chroma-key cutout, bilinear rotate)
// - Decoding and encoding behind swappable traits
// - No partial results: a failing action aborts the run before anything is written

pub mod config;
pub mod engine;
pub mod error;
pub mod ops;

pub use config::ManipulatorConfig;
pub use engine::{ImageManipulator, OutputDescriptor, PixelBuffer};
pub use error::{ErrorCategory, ManipulatorError, Result};
pub use ops::{parse_actions, parse_save_options, Action, CutoutColor, OutputFormat, SaveOptions, Tolerances};
