// src/error.rs
//
// Unified error handling for image-manipulator
// Uses thiserror for simple, type-safe error handling
//
// Error Taxonomy:
// - UserError: Invalid input, recoverable
// - CodecError: Decode/encode issues
// - ResourceLimit: Dimension limits and disk I/O
// - InternalBug: Invariant failures (should not happen)

use std::borrow::Cow;
use thiserror::Error;

/// Error taxonomy shared by every failure a manipulation run can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCategory {
    /// Invalid input, recoverable by user
    UserError,
    /// Decode/encode issues
    CodecError,
    /// Dimension limits and disk I/O
    ResourceLimit,
    /// Invariant failures (should not happen)
    InternalBug,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::UserError => "UserError",
            ErrorCategory::CodecError => "CodecError",
            ErrorCategory::ResourceLimit => "ResourceLimit",
            ErrorCategory::InternalBug => "InternalBug",
        }
    }
}

/// image-manipulator error types
///
/// Every error terminates the run it occurred in. Nothing is retried internally.
#[derive(Debug, Error)]
pub enum ManipulatorError {
    // Argument Errors
    #[error("Uri passed to ImageManipulator cannot be empty!")]
    ArgsError,

    #[error("Invalid actions: {message}")]
    InvalidActions { message: Cow<'static, str> },

    // Decode Errors
    #[error("Could not get decoded bitmap of {uri}{}", cause_suffix(.cause))]
    DecodeFailed {
        uri: Cow<'static, str>,
        cause: Option<Cow<'static, str>>,
    },

    #[error("Pixel data length {actual} does not match {width}x{height} RGBA (expected {expected})")]
    InvalidBuffer {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    // Size Limit Errors
    #[error("Image dimension {dimension} exceeds maximum {max}")]
    DimensionExceedsLimit { dimension: u32, max: u32 },

    #[error("Image pixel count {pixels} exceeds maximum {max}")]
    PixelCountExceedsLimit { pixels: u64, max: u64 },

    // Operation Errors
    #[error("Invalid crop options has been passed. Please make sure the requested crop rectangle ({x}+{width}, {y}+{height}) is inside source image ({img_width}x{img_height}).")]
    InvalidCropRegion {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        img_width: u32,
        img_height: u32,
    },

    #[error("Invalid resize dimensions: {width}x{height} (computed from {source_width}x{source_height})")]
    InvalidDimensions {
        width: i64,
        height: i64,
        source_width: u32,
        source_height: u32,
    },

    #[error("Resize failed ({source_width}x{source_height} -> {target_width}x{target_height}): {message}")]
    ResizeFailed {
        source_width: u32,
        source_height: u32,
        target_width: u32,
        target_height: u32,
        message: Cow<'static, str>,
    },

    #[error("Pixel ({x}, {y}) is outside the {width}x{height} buffer")]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    // Encode Errors
    #[error("Failed to encode as {format}: {message}")]
    EncodeFailed {
        format: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    // Output Errors
    #[error("Failed to write file '{path}': {source}")]
    FileWriteFailed {
        path: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },
}

fn cause_suffix(cause: &Option<Cow<'static, str>>) -> String {
    match cause {
        Some(cause) => format!(": {cause}"),
        None => ".".to_string(),
    }
}

// Constructor Helpers
impl ManipulatorError {
    pub fn args_error() -> Self {
        Self::ArgsError
    }

    pub fn invalid_actions(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidActions {
            message: message.into(),
        }
    }

    pub fn decode_failed(
        uri: impl Into<Cow<'static, str>>,
        cause: Option<impl Into<Cow<'static, str>>>,
    ) -> Self {
        Self::DecodeFailed {
            uri: uri.into(),
            cause: cause.map(Into::into),
        }
    }

    pub fn invalid_buffer(width: u32, height: u32, expected: usize, actual: usize) -> Self {
        Self::InvalidBuffer {
            width,
            height,
            expected,
            actual,
        }
    }

    pub fn dimension_exceeds_limit(dimension: u32, max: u32) -> Self {
        Self::DimensionExceedsLimit { dimension, max }
    }

    pub fn pixel_count_exceeds_limit(pixels: u64, max: u64) -> Self {
        Self::PixelCountExceedsLimit { pixels, max }
    }

    pub fn invalid_crop_region(
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        img_width: u32,
        img_height: u32,
    ) -> Self {
        Self::InvalidCropRegion {
            x,
            y,
            width,
            height,
            img_width,
            img_height,
        }
    }

    pub fn invalid_dimensions(target: (i64, i64), source: (u32, u32)) -> Self {
        Self::InvalidDimensions {
            width: target.0,
            height: target.1,
            source_width: source.0,
            source_height: source.1,
        }
    }

    pub fn resize_failed(
        source_dims: (u32, u32),
        target_dims: (u32, u32),
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::ResizeFailed {
            source_width: source_dims.0,
            source_height: source_dims.1,
            target_width: target_dims.0,
            target_height: target_dims.1,
            message: message.into(),
        }
    }

    pub fn out_of_bounds(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self::OutOfBounds {
            x,
            y,
            width,
            height,
        }
    }

    pub fn encode_failed(
        format: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::EncodeFailed {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn file_write_failed(path: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::FileWriteFailed {
            path: path.into(),
            source,
        }
    }

    /// Check if this error is recoverable (user can fix it)
    ///
    /// Consistent with category(): UserError and ResourceLimit are recoverable.
    pub fn is_recoverable(&self) -> bool {
        match self.category() {
            ErrorCategory::UserError | ErrorCategory::ResourceLimit => true,
            ErrorCategory::CodecError | ErrorCategory::InternalBug => false,
        }
    }

    /// Get the error category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ArgsError
            | Self::InvalidActions { .. }
            | Self::InvalidCropRegion { .. }
            | Self::InvalidDimensions { .. } => ErrorCategory::UserError,

            // ResizeFailed is a resampler failure on valid dimensions, closer to a codec fault
            Self::DecodeFailed { .. } | Self::EncodeFailed { .. } | Self::ResizeFailed { .. } => {
                ErrorCategory::CodecError
            }

            Self::DimensionExceedsLimit { .. }
            | Self::PixelCountExceedsLimit { .. }
            | Self::FileWriteFailed { .. } => ErrorCategory::ResourceLimit,

            // A decoder handing over a short buffer is a collaborator bug, not user input.
            Self::InvalidBuffer { .. } | Self::OutOfBounds { .. } => ErrorCategory::InternalBug,
        }
    }

    /// Reject tag reported to the caller alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ArgsError => "E_ARGS_ERR",
            Self::DecodeFailed { .. } | Self::InvalidBuffer { .. } => "E_DECODE_ERR",
            Self::InvalidCropRegion { .. } => "E_INVALID_CROP_DATA",
            Self::InvalidActions { .. } => "E_INVALID_ACTIONS",
            Self::InvalidDimensions { .. } => "E_INVALID_DIMENSIONS",
            Self::ResizeFailed { .. } => "E_RESIZE_ERR",
            Self::OutOfBounds { .. } => "E_OUT_OF_BOUNDS",
            Self::DimensionExceedsLimit { .. } | Self::PixelCountExceedsLimit { .. } => {
                "E_LIMIT_EXCEEDED"
            }
            Self::EncodeFailed { .. } => "E_ENCODE_ERR",
            Self::FileWriteFailed { .. } => "E_WRITE_ERR",
        }
    }
}

// Result type alias
pub type Result<T> = std::result::Result<T, ManipulatorError>;
