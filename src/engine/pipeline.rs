// src/engine/pipeline.rs
//
// Pipeline: apply an ordered action list to a buffer, one owned buffer per step.

use crate::engine::buffer::PixelBuffer;
use crate::engine::cutout::cutout;
use crate::engine::geometry::{flip, resize, rotate_with};
use crate::engine::pool::Parallelism;
use crate::error::{ManipulatorError, Result};
use crate::ops::Action;
use tracing::debug;

// Type alias for Result - always use ManipulatorError to preserve error taxonomy
type PipelineResult<T> = Result<T>;

/// Validate a crop rectangle against the buffer it will be cut from.
///
/// Origins may sit on the far edge, sizes may equal the buffer, but the
/// rectangle itself must be non-empty and end inside the buffer.
pub fn validate_crop(
    image_width: u32,
    image_height: u32,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
) -> PipelineResult<()> {
    let outside = x > image_width
        || y > image_height
        || width > image_width
        || height > image_height
        || width == 0
        || height == 0
        || x as u64 + width as u64 > image_width as u64
        || y as u64 + height as u64 > image_height as u64;

    if outside {
        return Err(ManipulatorError::invalid_crop_region(
            x,
            y,
            width,
            height,
            image_width,
            image_height,
        ));
    }
    Ok(())
}

/// Cut the `width x height` rectangle at `(x, y)` out of `buf`.
pub fn crop(buf: PixelBuffer, x: u32, y: u32, width: u32, height: u32) -> PipelineResult<PixelBuffer> {
    validate_crop(buf.width(), buf.height(), x, y, width, height)?;
    if (x, y, width, height) == (0, 0, buf.width(), buf.height()) {
        return Ok(buf);
    }
    buf.copy_region(x, y, width, height)
}

/// Apply one action to the buffer.
pub fn apply_action(
    buf: PixelBuffer,
    action: &Action,
    parallelism: &Parallelism,
) -> PipelineResult<PixelBuffer> {
    match action {
        Action::Resize { width, height } => resize(buf, *width, *height),
        Action::Rotate { degrees } => rotate_with(buf, *degrees, parallelism),
        Action::Flip {
            horizontal,
            vertical,
        } => flip(buf, *horizontal, *vertical),
        Action::Crop {
            x,
            y,
            width,
            height,
        } => crop(buf, *x, *y, *width, *height),
        Action::Cutout { color, tolerances } => Ok(cutout(buf, *color, *tolerances, parallelism)),
    }
}

/// Apply all actions in order.
///
/// Each action sees the buffer produced by the previous one. The first failure
/// aborts the run; no partial result is returned.
pub fn apply_actions(buf: PixelBuffer, actions: &[Action]) -> PipelineResult<PixelBuffer> {
    apply_actions_with(buf, actions, &Parallelism::default())
}

pub fn apply_actions_with(
    buf: PixelBuffer,
    actions: &[Action],
    parallelism: &Parallelism,
) -> PipelineResult<PixelBuffer> {
    let mut buf = buf;
    for (index, action) in actions.iter().enumerate() {
        let (image_width, image_height) = buf.dimensions();
        debug!(
            target: "image_manipulator::pipeline",
            index,
            action = action.name(),
            image_width,
            image_height,
            "apply action"
        );
        buf = apply_action(buf, action, parallelism)?;
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::buffer::TRANSPARENT;
    use crate::ops::{CutoutColor, Tolerances};

    fn create_test_buffer(width: u32, height: u32) -> PixelBuffer {
        PixelBuffer::from_fn(width, height, |x, y| {
            [(x % 256) as u8, (y % 256) as u8, 128, 255]
        })
        .unwrap()
    }

    mod crop_tests {
        use super::*;

        #[test]
        fn test_crop_valid() {
            let out = crop(create_test_buffer(100, 100), 10, 20, 30, 40).unwrap();
            assert_eq!(out.dimensions(), (30, 40));
            assert_eq!(out.get_pixel(0, 0).unwrap(), [10, 20, 128, 255]);
        }

        #[test]
        fn test_crop_right_edge_inclusive() {
            let out = crop(create_test_buffer(100, 50), 50, 0, 50, 50).unwrap();
            assert_eq!(out.dimensions(), (50, 50));
            assert_eq!(out.get_pixel(49, 49).unwrap(), [99, 49, 128, 255]);
        }

        #[test]
        fn test_crop_one_past_edge_fails() {
            let err = crop(create_test_buffer(100, 50), 51, 0, 50, 50).unwrap_err();
            assert!(matches!(err, ManipulatorError::InvalidCropRegion { x: 51, .. }));
            assert_eq!(err.code(), "E_INVALID_CROP_DATA");
        }

        #[test]
        fn test_crop_larger_than_buffer_fails() {
            assert!(crop(create_test_buffer(10, 10), 0, 0, 11, 5).is_err());
            assert!(crop(create_test_buffer(10, 10), 0, 0, 5, 11).is_err());
        }

        #[test]
        fn test_crop_origin_past_buffer_fails() {
            assert!(crop(create_test_buffer(10, 10), 11, 0, 1, 1).is_err());
        }

        #[test]
        fn test_crop_zero_size_fails() {
            assert!(crop(create_test_buffer(10, 10), 0, 0, 0, 5).is_err());
        }

        #[test]
        fn test_crop_entire_image_is_noop() {
            let buf = create_test_buffer(8, 8);
            assert_eq!(crop(buf.clone(), 0, 0, 8, 8).unwrap(), buf);
        }

        #[test]
        fn test_validate_crop_handles_overflow() {
            assert!(validate_crop(10, 10, u32::MAX, 0, 5, 5).is_err());
        }
    }

    mod apply_actions_tests {
        use super::*;

        #[test]
        fn test_resize_rotate_crop_chain() {
            let actions = vec![
                Action::Resize {
                    width: Some(100),
                    height: None,
                },
                Action::Rotate { degrees: 90 },
                Action::Crop {
                    x: 0,
                    y: 0,
                    width: 50,
                    height: 50,
                },
            ];
            let out = apply_actions(create_test_buffer(200, 100), &actions).unwrap();
            assert_eq!(out.dimensions(), (50, 50));
        }

        #[test]
        fn test_each_step_sees_previous_dimensions() {
            // After the first resize the buffer is 20x10, so a 15-wide crop is valid
            // only because the second resize brought it back up to 40x20.
            let actions = vec![
                Action::Resize {
                    width: Some(20),
                    height: None,
                },
                Action::Resize {
                    width: None,
                    height: Some(20),
                },
                Action::Crop {
                    x: 20,
                    y: 0,
                    width: 15,
                    height: 20,
                },
            ];
            let out = apply_actions(create_test_buffer(200, 100), &actions).unwrap();
            assert_eq!(out.dimensions(), (15, 20));
        }

        #[test]
        fn test_crop_failure_aborts_run() {
            let actions = vec![
                Action::Resize {
                    width: Some(10),
                    height: Some(10),
                },
                Action::Crop {
                    x: 0,
                    y: 0,
                    width: 11,
                    height: 1,
                },
                Action::Rotate { degrees: 90 },
            ];
            let err = apply_actions(create_test_buffer(20, 20), &actions).unwrap_err();
            assert!(matches!(
                err,
                ManipulatorError::InvalidCropRegion {
                    img_width: 10,
                    img_height: 10,
                    ..
                }
            ));
        }

        #[test]
        fn test_cutout_in_pipeline() {
            let buf = PixelBuffer::from_fn(4, 1, |x, _| {
                if x < 2 {
                    [10, 200, 10, 255]
                } else {
                    [200, 10, 10, 255]
                }
            })
            .unwrap();
            let actions = vec![Action::Cutout {
                color: CutoutColor::rgb(0, 255, 0),
                tolerances: Tolerances::default(),
            }];
            let out = apply_actions(buf, &actions).unwrap();
            assert_eq!(out.get_pixel(0, 0).unwrap(), TRANSPARENT);
            assert_eq!(out.get_pixel(1, 0).unwrap(), TRANSPARENT);
            assert_eq!(out.get_pixel(2, 0).unwrap(), [200, 10, 10, 255]);
        }

        #[test]
        fn test_cutout_extreme_tolerance_from_json() {
            let buf = PixelBuffer::from_fn(2, 2, |x, _| {
                if x == 0 {
                    [255, 255, 255, 255]
                } else {
                    [0, 40, 0, 255]
                }
            })
            .unwrap();

            let keep_all = crate::ops::parse_actions(
                r#"[{"cutout": {"green": 255, "toleranceGreen": -2147483648}}]"#,
            )
            .unwrap();
            assert_eq!(apply_actions(buf.clone(), &keep_all).unwrap(), buf);

            let clear_bright = crate::ops::parse_actions(
                r#"[{"cutout": {"green": 255, "toleranceGreen": 2147483647}}]"#,
            )
            .unwrap();
            let out = apply_actions(buf, &clear_bright).unwrap();
            assert_eq!(out.get_pixel(0, 1).unwrap(), TRANSPARENT);
            assert_eq!(out.get_pixel(1, 1).unwrap(), [0, 40, 0, 255]);
        }

        #[test]
        fn test_flip_twice_restores() {
            let buf = create_test_buffer(9, 4);
            let actions = vec![
                Action::Flip {
                    horizontal: true,
                    vertical: false,
                },
                Action::Flip {
                    horizontal: true,
                    vertical: false,
                },
            ];
            assert_eq!(apply_actions(buf.clone(), &actions).unwrap(), buf);
        }

        #[test]
        fn test_empty_actions() {
            let buf = create_test_buffer(3, 3);
            assert_eq!(apply_actions(buf.clone(), &[]).unwrap(), buf);
        }

        #[test]
        fn test_invalid_resize_aborts_run() {
            let actions = vec![Action::Resize {
                width: None,
                height: None,
            }];
            let err = apply_actions(create_test_buffer(3, 3), &actions).unwrap_err();
            assert_eq!(err.code(), "E_INVALID_DIMENSIONS");
        }
    }
}
