// src/ops.rs
//
// Pipeline actions and save options.
// These are cheap to create and store - the pixel work happens in engine::pipeline.

use crate::error::{ManipulatorError, Result};
use serde::de::{self, Deserializer};
use serde::Deserialize;
use tracing::warn;

/// Tolerance applied to every channel the caller does not override.
pub const DEFAULT_TOLERANCE: i32 = 40;

/// A single transform in the action list.
///
/// Each action is self-contained: it only needs the buffer it is applied to.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    /// Resize with optional width/height (keeps aspect ratio if one is None)
    Resize {
        width: Option<u32>,
        height: Option<u32>,
    },

    /// Rotate around the center by any angle, keeping the original bounds
    Rotate { degrees: i32 },

    /// Mirror horizontally and/or vertically
    Flip { horizontal: bool, vertical: bool },

    /// Copy a sub-rectangle out of the buffer
    Crop {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    /// Chroma-key background removal
    Cutout {
        color: CutoutColor,
        tolerances: Tolerances,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Resize { .. } => "resize",
            Action::Rotate { .. } => "rotate",
            Action::Flip { .. } => "flip",
            Action::Crop { .. } => "crop",
            Action::Cutout { .. } => "cutout",
        }
    }
}

/// Reference "background" color. Only the relative order of red/green/blue matters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CutoutColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: u8,
}

impl CutoutColor {
    pub fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self {
            red,
            green,
            blue,
            alpha: 0,
        }
    }
}

/// Per-channel margins. `alpha` is carried for callers but never read by the classifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tolerances {
    pub red: i32,
    pub green: i32,
    pub blue: i32,
    pub alpha: i32,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self::uniform(DEFAULT_TOLERANCE)
    }
}

impl Tolerances {
    pub fn uniform(value: i32) -> Self {
        Self {
            red: value,
            green: value,
            blue: value,
            alpha: value,
        }
    }
}

/// Output format for encoding
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    #[default]
    Jpeg,
}

impl OutputFormat {
    /// Unknown names fall back to JPEG instead of failing.
    pub fn parse(format: &str) -> Self {
        match format.to_lowercase().as_str() {
            "png" => Self::Png,
            _ => Self::Jpeg,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
        }
    }

    /// File extension including the leading dot
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => ".png",
            Self::Jpeg => ".jpg",
        }
    }
}

/// How the final buffer is encoded and reported.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SaveOptions {
    #[serde(deserialize_with = "de_format")]
    pub format: OutputFormat,
    /// Compression quality in [0, 1]
    #[serde(alias = "compress")]
    pub quality: f64,
    /// Also return the encoded bytes as base64
    #[serde(rename = "base64")]
    pub emit_base64: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Jpeg,
            quality: 1.0,
            emit_base64: false,
        }
    }
}

impl SaveOptions {
    /// Encoder quality 0-100, `round(100 * quality)`.
    pub fn quality_percent(&self) -> u8 {
        if !self.quality.is_finite() {
            return 100;
        }
        (self.quality * 100.0).round().clamp(0.0, 100.0) as u8
    }
}

// =============================================================================
// WIRE FORMAT
// =============================================================================

/// One entry of the action array as the bridge sends it.
///
/// Several keys may be present at once; only the first in
/// resize > rotate > flip > crop > cutout order is applied.
#[derive(Debug, Default, Deserialize)]
pub struct ActionEntry {
    #[serde(default)]
    resize: Option<ResizeSpec>,
    #[serde(default, deserialize_with = "de_opt_degrees")]
    rotate: Option<i32>,
    #[serde(default)]
    flip: Option<FlipSpec>,
    #[serde(default)]
    crop: Option<CropSpec>,
    #[serde(default)]
    cutout: Option<CutoutSpec>,
}

#[derive(Debug, Default, Deserialize)]
struct ResizeSpec {
    #[serde(default, deserialize_with = "de_opt_dimension")]
    width: Option<u32>,
    #[serde(default, deserialize_with = "de_opt_dimension")]
    height: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FlipSpec {
    horizontal: bool,
    vertical: bool,
}

#[derive(Debug, Deserialize)]
struct CropSpec {
    #[serde(rename = "originX", deserialize_with = "de_dimension")]
    origin_x: u32,
    #[serde(rename = "originY", deserialize_with = "de_dimension")]
    origin_y: u32,
    #[serde(deserialize_with = "de_dimension")]
    width: u32,
    #[serde(deserialize_with = "de_dimension")]
    height: u32,
}

// The published JS API spelled the tolerance keys "tolarence*"; both spellings are accepted.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct CutoutSpec {
    #[serde(deserialize_with = "de_channel")]
    red: u8,
    #[serde(deserialize_with = "de_channel")]
    green: u8,
    #[serde(deserialize_with = "de_channel")]
    blue: u8,
    #[serde(deserialize_with = "de_channel")]
    alpha: u8,
    #[serde(rename = "toleranceRed", alias = "tolarenceRed", deserialize_with = "de_tolerance")]
    tolerance_red: i32,
    #[serde(rename = "toleranceGreen", alias = "tolarenceGreen", deserialize_with = "de_tolerance")]
    tolerance_green: i32,
    #[serde(rename = "toleranceBlue", alias = "tolarenceBlue", deserialize_with = "de_tolerance")]
    tolerance_blue: i32,
    #[serde(rename = "toleranceAlpha", alias = "tolarenceAlpha", deserialize_with = "de_tolerance")]
    tolerance_alpha: i32,
}

impl Default for CutoutSpec {
    fn default() -> Self {
        Self {
            red: 0,
            green: 0,
            blue: 0,
            alpha: 0,
            tolerance_red: DEFAULT_TOLERANCE,
            tolerance_green: DEFAULT_TOLERANCE,
            tolerance_blue: DEFAULT_TOLERANCE,
            tolerance_alpha: DEFAULT_TOLERANCE,
        }
    }
}

impl ActionEntry {
    /// Resolve the entry to the action it selects, or None if it names no known transform.
    pub fn into_action(self) -> Option<Action> {
        if let Some(resize) = self.resize {
            return Some(Action::Resize {
                width: resize.width,
                height: resize.height,
            });
        }
        if let Some(degrees) = self.rotate {
            return Some(Action::Rotate { degrees });
        }
        if let Some(flip) = self.flip {
            return Some(Action::Flip {
                horizontal: flip.horizontal,
                vertical: flip.vertical,
            });
        }
        if let Some(crop) = self.crop {
            return Some(Action::Crop {
                x: crop.origin_x,
                y: crop.origin_y,
                width: crop.width,
                height: crop.height,
            });
        }
        self.cutout.map(|cutout| Action::Cutout {
            color: CutoutColor {
                red: cutout.red,
                green: cutout.green,
                blue: cutout.blue,
                alpha: cutout.alpha,
            },
            tolerances: Tolerances {
                red: cutout.tolerance_red,
                green: cutout.tolerance_green,
                blue: cutout.tolerance_blue,
                alpha: cutout.tolerance_alpha,
            },
        })
    }
}

/// Parse a JSON action array. Entries without a known key are skipped.
pub fn parse_actions(json: &str) -> Result<Vec<Action>> {
    let entries: Vec<ActionEntry> =
        serde_json::from_str(json).map_err(|e| ManipulatorError::invalid_actions(e.to_string()))?;

    let mut actions = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        match entry.into_action() {
            Some(action) => actions.push(action),
            None => {
                warn!(target: "image_manipulator::pipeline", index, "action entry has no known transform; skipped");
            }
        }
    }
    Ok(actions)
}

/// Parse a JSON save-options object. Missing keys take their defaults.
pub fn parse_save_options(json: &str) -> Result<SaveOptions> {
    serde_json::from_str(json).map_err(|e| ManipulatorError::invalid_actions(e.to_string()))
}

fn de_format<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<OutputFormat, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Ok(OutputFormat::parse(&raw))
}

// Bridge numbers arrive as doubles and are truncated toward zero.
fn truncate_dimension<E: de::Error>(value: f64) -> std::result::Result<u32, E> {
    let truncated = value.trunc();
    if !truncated.is_finite() || truncated < 0.0 {
        return Err(E::custom(format!(
            "expected a non-negative number, got {value}"
        )));
    }
    Ok(truncated.min(u32::MAX as f64) as u32)
}

fn de_dimension<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u32, D::Error> {
    truncate_dimension(f64::deserialize(deserializer)?)
}

fn de_opt_dimension<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<u32>, D::Error> {
    Option::<f64>::deserialize(deserializer)?
        .map(truncate_dimension)
        .transpose()
}

fn finite_number<E: de::Error>(value: f64) -> std::result::Result<f64, E> {
    if !value.is_finite() {
        return Err(E::custom(format!("expected a finite number, got {value}")));
    }
    Ok(value.trunc())
}

// Color channels outside 0..=255 saturate instead of failing the whole request.
fn de_channel<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u8, D::Error> {
    let value = finite_number(f64::deserialize(deserializer)?)?;
    Ok(value.clamp(0.0, u8::MAX as f64) as u8)
}

fn de_tolerance<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<i32, D::Error> {
    let value = finite_number(f64::deserialize(deserializer)?)?;
    Ok(value.clamp(i32::MIN as f64, i32::MAX as f64) as i32)
}

// The bridge sends a bare number; `{"degrees": n}` is accepted as well.
#[derive(Deserialize)]
#[serde(untagged)]
enum RotateSpec {
    Bare(f64),
    Object { degrees: f64 },
}

fn de_opt_degrees<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<i32>, D::Error> {
    let value = match Option::<RotateSpec>::deserialize(deserializer)? {
        Some(RotateSpec::Bare(value)) | Some(RotateSpec::Object { degrees: value }) => value,
        None => return Ok(None),
    };
    if !value.is_finite() {
        return Err(de::Error::custom(format!("invalid rotation {value}")));
    }
    Ok(Some(value.trunc().clamp(i32::MIN as f64, i32::MAX as f64) as i32))
}

#[cfg(test)]
mod tests {
    use super::*;

    mod parse_actions_tests {
        use super::*;

        #[test]
        fn test_each_transform_key() {
            let actions = parse_actions(
                r#"[
                    {"resize": {"width": 100}},
                    {"rotate": 90},
                    {"flip": {"horizontal": true}},
                    {"crop": {"originX": 0, "originY": 0, "width": 50, "height": 50}},
                    {"cutout": {"green": 255}}
                ]"#,
            )
            .unwrap();

            assert_eq!(
                actions,
                vec![
                    Action::Resize {
                        width: Some(100),
                        height: None
                    },
                    Action::Rotate { degrees: 90 },
                    Action::Flip {
                        horizontal: true,
                        vertical: false
                    },
                    Action::Crop {
                        x: 0,
                        y: 0,
                        width: 50,
                        height: 50
                    },
                    Action::Cutout {
                        color: CutoutColor::rgb(0, 255, 0),
                        tolerances: Tolerances::default(),
                    },
                ]
            );
        }

        #[test]
        fn test_multi_key_entry_uses_priority_order() {
            let actions =
                parse_actions(r#"[{"crop": {"originX": 0, "originY": 0, "width": 1, "height": 1}, "rotate": 45, "flip": {"vertical": true}}]"#)
                    .unwrap();
            assert_eq!(actions, vec![Action::Rotate { degrees: 45 }]);

            let actions = parse_actions(r#"[{"cutout": {}, "flip": {"vertical": true}}]"#).unwrap();
            assert_eq!(
                actions,
                vec![Action::Flip {
                    horizontal: false,
                    vertical: true
                }]
            );
        }

        #[test]
        fn test_rotate_object_form() {
            let actions = parse_actions(r#"[{"rotate": {"degrees": 90}}, {"rotate": 270}]"#).unwrap();
            assert_eq!(
                actions,
                vec![Action::Rotate { degrees: 90 }, Action::Rotate { degrees: 270 }]
            );
        }

        #[test]
        fn test_unknown_entries_are_skipped() {
            let actions = parse_actions(r#"[{"blur": 3}, {"rotate": 180}, {}]"#).unwrap();
            assert_eq!(actions, vec![Action::Rotate { degrees: 180 }]);
        }

        #[test]
        fn test_fractional_numbers_truncate() {
            let actions =
                parse_actions(r#"[{"resize": {"width": 99.9, "height": 10.2}}, {"rotate": -45.7}]"#)
                    .unwrap();
            assert_eq!(
                actions,
                vec![
                    Action::Resize {
                        width: Some(99),
                        height: Some(10)
                    },
                    Action::Rotate { degrees: -45 },
                ]
            );
        }

        #[test]
        fn test_crop_missing_key_is_rejected() {
            let err = parse_actions(r#"[{"crop": {"originX": 0, "originY": 0, "width": 5}}]"#)
                .unwrap_err();
            assert_eq!(err.code(), "E_INVALID_ACTIONS");
            assert!(err.to_string().contains("height"));
        }

        #[test]
        fn test_negative_dimension_is_rejected() {
            let err = parse_actions(r#"[{"resize": {"width": -5}}]"#).unwrap_err();
            assert!(matches!(err, ManipulatorError::InvalidActions { .. }));
        }

        #[test]
        fn test_cutout_accepts_misspelled_tolerance_keys() {
            let actions = parse_actions(
                r#"[{"cutout": {"red": 200, "tolarenceRed": 10, "toleranceBlue": 5, "alpha": 255}}]"#,
            )
            .unwrap();
            assert_eq!(
                actions,
                vec![Action::Cutout {
                    color: CutoutColor {
                        red: 200,
                        green: 0,
                        blue: 0,
                        alpha: 255
                    },
                    tolerances: Tolerances {
                        red: 10,
                        green: DEFAULT_TOLERANCE,
                        blue: 5,
                        alpha: DEFAULT_TOLERANCE,
                    },
                }]
            );
        }

        #[test]
        fn test_cutout_numbers_saturate_and_truncate() {
            let actions = parse_actions(
                r#"[{"cutout": {"green": 300, "red": -4, "blue": 12.9, "toleranceGreen": 12.7, "toleranceRed": -2147483648, "toleranceBlue": 1e12}}]"#,
            )
            .unwrap();
            assert_eq!(
                actions,
                vec![Action::Cutout {
                    color: CutoutColor::rgb(0, 255, 12),
                    tolerances: Tolerances {
                        red: i32::MIN,
                        green: 12,
                        blue: i32::MAX,
                        alpha: DEFAULT_TOLERANCE,
                    },
                }]
            );
        }

        #[test]
        fn test_cutout_non_number_is_rejected() {
            let err = parse_actions(r#"[{"cutout": {"green": "lime"}}]"#).unwrap_err();
            assert_eq!(err.code(), "E_INVALID_ACTIONS");
        }

        #[test]
        fn test_not_an_array_is_rejected() {
            assert!(parse_actions(r#"{"rotate": 90}"#).is_err());
        }
    }

    mod save_options_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let options = parse_save_options("{}").unwrap();
            assert_eq!(options, SaveOptions::default());
            assert_eq!(options.format, OutputFormat::Jpeg);
            assert_eq!(options.quality_percent(), 100);
            assert!(!options.emit_base64);
        }

        #[test]
        fn test_compress_alias_and_base64() {
            let options =
                parse_save_options(r#"{"format": "png", "compress": 0.5, "base64": true}"#)
                    .unwrap();
            assert_eq!(options.format, OutputFormat::Png);
            assert_eq!(options.quality_percent(), 50);
            assert!(options.emit_base64);
        }

        #[test]
        fn test_quality_and_compress_together_are_rejected() {
            // Same field under two names; serde reports it as a duplicate
            let err = parse_save_options(r#"{"quality": 0.5, "compress": 0.8}"#).unwrap_err();
            assert_eq!(err.code(), "E_INVALID_ACTIONS");
            assert!(err.to_string().contains("duplicate field"));
        }

        #[test]
        fn test_unknown_format_falls_back_to_jpeg() {
            let options = parse_save_options(r#"{"format": "gif"}"#).unwrap();
            assert_eq!(options.format, OutputFormat::Jpeg);
            assert_eq!(options.format.extension(), ".jpg");
        }

        #[test]
        fn test_quality_rounds_and_clamps() {
            let mut options = SaveOptions::default();
            options.quality = 0.876;
            assert_eq!(options.quality_percent(), 88);
            options.quality = 1.7;
            assert_eq!(options.quality_percent(), 100);
            options.quality = -0.2;
            assert_eq!(options.quality_percent(), 0);
        }
    }
}
