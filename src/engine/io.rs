// src/engine/io.rs
//
// Output publishing: write encoded bytes under a fresh unique name and describe the result.

use crate::error::{ManipulatorError, Result};
use crate::ops::OutputFormat;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;
use uuid::Uuid;

/// What a successful run reports back.
///
/// `width`/`height` are the final buffer's dimensions, which are also the
/// dimensions of the image stored at `uri`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OutputDescriptor {
    pub uri: String,
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,
}

impl OutputDescriptor {
    /// Filesystem path behind `uri`.
    pub fn path(&self) -> PathBuf {
        crate::engine::decoder::uri_to_path(&self.uri)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            ManipulatorError::encode_failed("json", format!("failed to serialize output: {e}"))
        })
    }
}

/// `<random uuid><.ext>`
pub fn output_file_name(format: OutputFormat) -> String {
    format!("{}{}", Uuid::new_v4(), format.extension())
}

/// Write `bytes` to a new file in `output_dir` and build its descriptor.
///
/// The file only appears under its final name once fully written and synced;
/// on failure nothing is left behind.
pub fn publish_output(
    bytes: &[u8],
    format: OutputFormat,
    dimensions: (u32, u32),
    output_dir: &Path,
    emit_base64: bool,
) -> Result<OutputDescriptor> {
    std::fs::create_dir_all(output_dir).map_err(|e| {
        ManipulatorError::file_write_failed(output_dir.to_string_lossy().to_string(), e)
    })?;
    // Resolved before anything is written, so the published file is the last step
    let output_dir = std::fs::canonicalize(output_dir).map_err(|e| {
        ManipulatorError::file_write_failed(output_dir.to_string_lossy().to_string(), e)
    })?;

    // Temp file in the target directory so the final rename stays on one filesystem
    let mut temp_file = NamedTempFile::new_in(&output_dir).map_err(|e| {
        ManipulatorError::file_write_failed(output_dir.to_string_lossy().to_string(), e)
    })?;
    let temp_path = temp_file.path().to_path_buf();

    temp_file
        .write_all(bytes)
        .map_err(|e| ManipulatorError::file_write_failed(temp_path.display().to_string(), e))?;
    temp_file
        .as_file_mut()
        .sync_all()
        .map_err(|e| ManipulatorError::file_write_failed(temp_path.display().to_string(), e))?;

    let final_path = output_dir.join(output_file_name(format));
    temp_file.persist(&final_path).map_err(|e| {
        ManipulatorError::file_write_failed(final_path.display().to_string(), e.error)
    })?;

    debug!(
        target: "image_manipulator::io",
        path = %final_path.display(),
        bytes = bytes.len(),
        emit_base64,
        "published output"
    );

    Ok(OutputDescriptor {
        uri: format!("file://{}", final_path.display()),
        width: dimensions.0,
        height: dimensions.1,
        base64: emit_base64.then(|| STANDARD.encode(bytes)),
    })
}
