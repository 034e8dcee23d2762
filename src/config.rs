// src/config.rs
//
// Runtime configuration for a manipulator instance.
// Defaults are safe for a server process; every field can be overridden from the environment.

use std::path::PathBuf;

/// Maximum allowed image dimension (width or height).
/// Images larger than 32768x32768 are rejected to prevent decompression bombs.
pub const MAX_DIMENSION: u32 = 32768;

/// Maximum allowed total pixels (width * height).
/// 100 megapixels = 400MB uncompressed RGBA.
pub const MAX_PIXELS: u64 = 100_000_000;

/// Below this pixel count, per-pixel work stays on the calling thread.
pub const DEFAULT_PARALLEL_THRESHOLD: u64 = 65_536;

pub const ENV_OUTPUT_DIR: &str = "IMAGE_MANIPULATOR_OUTPUT_DIR";
pub const ENV_MAX_DIMENSION: &str = "IMAGE_MANIPULATOR_MAX_DIMENSION";
pub const ENV_MAX_PIXELS: &str = "IMAGE_MANIPULATOR_MAX_PIXELS";
pub const ENV_PARALLEL_THRESHOLD: &str = "IMAGE_MANIPULATOR_PARALLEL_THRESHOLD";
pub const ENV_THREADS: &str = "IMAGE_MANIPULATOR_THREADS";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManipulatorConfig {
    /// Directory that receives published output files
    pub output_dir: PathBuf,
    /// Largest accepted width or height of a decoded source
    pub max_dimension: u32,
    /// Largest accepted width * height of a decoded source
    pub max_pixels: u64,
    /// Pixel count at which rotate/cutout switch to the worker pool
    pub parallel_threshold: u64,
    /// Worker pool size (None = available parallelism).
    /// Only the first manipulator to touch the pool decides its size.
    pub threads: Option<usize>,
}

impl Default for ManipulatorConfig {
    fn default() -> Self {
        Self {
            output_dir: std::env::temp_dir(),
            max_dimension: MAX_DIMENSION,
            max_pixels: MAX_PIXELS,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            threads: None,
        }
    }
}

impl ManipulatorConfig {
    /// Build a config from `IMAGE_MANIPULATOR_*` variables.
    /// Missing or unparsable values keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            output_dir: lookup(ENV_OUTPUT_DIR)
                .filter(|raw| !raw.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            max_dimension: parse_or(lookup(ENV_MAX_DIMENSION), defaults.max_dimension),
            max_pixels: parse_or(lookup(ENV_MAX_PIXELS), defaults.max_pixels),
            parallel_threshold: parse_or(
                lookup(ENV_PARALLEL_THRESHOLD),
                defaults.parallel_threshold,
            ),
            threads: lookup(ENV_THREADS)
                .and_then(|raw| raw.trim().parse::<usize>().ok())
                .filter(|n| *n > 0),
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|raw| raw.trim().parse::<T>().ok())
        .unwrap_or(default)
}
