// src/engine/api.rs
//
// ImageManipulator: the request facade. One call = decode, run actions, encode, publish.

use crate::config::ManipulatorConfig;
use crate::engine::buffer::PixelBuffer;
use crate::engine::decoder::{FileDecoder, SourceDecoder};
use crate::engine::encoder::{BufferEncoder, NativeEncoder};
use crate::engine::io::{publish_output, OutputDescriptor};
use crate::engine::pipeline::apply_actions_with;
use crate::engine::pool::Parallelism;
use crate::error::{ManipulatorError, Result};
use crate::ops::{parse_actions, parse_save_options, Action, SaveOptions};
use tracing::debug;

/// Runs manipulation requests against a fixed configuration.
///
/// Usage:
/// ```no_run
/// use image_manipulator::{Action, ImageManipulator, ManipulatorConfig, SaveOptions};
///
/// let manipulator = ImageManipulator::new(ManipulatorConfig::from_env());
/// let out = manipulator.manipulate(
///     "file:///tmp/photo.jpg",
///     &[Action::Rotate { degrees: 90 }],
///     &SaveOptions::default(),
/// )?;
/// println!("{} ({}x{})", out.uri, out.width, out.height);
/// # Ok::<(), image_manipulator::ManipulatorError>(())
/// ```
///
/// Runs share nothing but the configuration, so one instance can serve
/// concurrent requests.
pub struct ImageManipulator {
    config: ManipulatorConfig,
    decoder: Box<dyn SourceDecoder>,
    encoder: Box<dyn BufferEncoder>,
}

impl ImageManipulator {
    pub fn new(config: ManipulatorConfig) -> Self {
        let decoder = Box::new(FileDecoder::from(&config));
        Self {
            config,
            decoder,
            encoder: Box::new(NativeEncoder),
        }
    }

    pub fn with_decoder(mut self, decoder: impl SourceDecoder + 'static) -> Self {
        self.decoder = Box::new(decoder);
        self
    }

    pub fn with_encoder(mut self, encoder: impl BufferEncoder + 'static) -> Self {
        self.encoder = Box::new(encoder);
        self
    }

    pub fn config(&self) -> &ManipulatorConfig {
        &self.config
    }

    fn parallelism(&self) -> Parallelism {
        Parallelism::from(&self.config)
    }

    /// Decode `uri`, apply `actions` in order, encode and publish the result.
    pub fn manipulate(
        &self,
        uri: &str,
        actions: &[Action],
        save: &SaveOptions,
    ) -> Result<OutputDescriptor> {
        if uri.is_empty() {
            return Err(ManipulatorError::args_error());
        }
        debug!(
            target: "image_manipulator::pipeline",
            uri,
            actions = actions.len(),
            format = save.format.as_str(),
            "manipulate"
        );
        let buf = self.decoder.decode(uri)?;
        self.manipulate_buffer(buf, actions, save)
    }

    /// Same as [`manipulate`](Self::manipulate) with the raw JSON request bodies.
    pub fn manipulate_json(
        &self,
        uri: &str,
        actions_json: &str,
        save_json: &str,
    ) -> Result<OutputDescriptor> {
        if uri.is_empty() {
            return Err(ManipulatorError::args_error());
        }
        let actions = parse_actions(actions_json)?;
        let save = parse_save_options(save_json)?;
        self.manipulate(uri, &actions, &save)
    }

    /// Run an already decoded buffer through actions, encode and publish.
    pub fn manipulate_buffer(
        &self,
        buf: PixelBuffer,
        actions: &[Action],
        save: &SaveOptions,
    ) -> Result<OutputDescriptor> {
        let (out, bytes) = self.render(buf, actions, save)?;
        publish_output(
            &bytes,
            save.format,
            out.dimensions(),
            &self.config.output_dir,
            save.emit_base64,
        )
    }

    /// Apply actions and encode without touching disk.
    ///
    /// Returns the final buffer together with its encoded bytes.
    pub fn render(
        &self,
        buf: PixelBuffer,
        actions: &[Action],
        save: &SaveOptions,
    ) -> Result<(PixelBuffer, Vec<u8>)> {
        let out = apply_actions_with(buf, actions, &self.parallelism())?;
        let bytes = self
            .encoder
            .encode(&out, save.format, save.quality_percent())?;
        Ok((out, bytes))
    }
}

impl Default for ImageManipulator {
    fn default() -> Self {
        Self::new(ManipulatorConfig::default())
    }
}
