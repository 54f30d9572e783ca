//! Image resizing for the recognition model.
//!
//! Rectified text strips vary in aspect ratio, but the recognition network
//! wants a fixed input shape. Strips are scaled to the target height, width
//! capped, then right-padded with black to the full width.

use crate::core::OcrError;
use image::RgbImage;
use image::imageops::{self, FilterType};

/// Resizes text strips into the recognition model's fixed input shape.
#[derive(Debug, Clone)]
pub struct RecResize {
    image_shape: [usize; 3],
}

impl RecResize {
    /// Creates a resizer for the given `[channels, height, width]` shape.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` unless the shape is 3-channel with non-zero
    /// height and width.
    pub fn new(image_shape: [usize; 3]) -> Result<Self, OcrError> {
        let [c, h, w] = image_shape;
        if c != 3 {
            return Err(OcrError::config_error(format!(
                "recognition input must have 3 channels, got {c}"
            )));
        }
        if h == 0 || w == 0 {
            return Err(OcrError::config_error(format!(
                "recognition input dimensions must be non-zero, got {h}x{w}"
            )));
        }
        Ok(Self { image_shape })
    }

    /// Resizes a strip to the target height and pads it to the full width.
    ///
    /// The scaled width is `ceil(target_height * aspect_ratio)`, hard-capped
    /// at the configured width; narrower results are right-padded with black.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a zero-area image.
    pub fn apply(&self, img: &RgbImage) -> Result<RgbImage, OcrError> {
        let (w, h) = img.dimensions();
        if w == 0 || h == 0 {
            return Err(OcrError::invalid_input(format!(
                "cannot resize an empty text strip ({w}x{h})"
            )));
        }

        let [_, target_h, max_w] = self.image_shape;
        let (target_h, max_w) = (target_h as u32, max_w as u32);

        let ratio = w as f32 / h as f32;
        let resize_w = ((target_h as f32 * ratio).ceil() as u32).min(max_w);
        let resized = imageops::resize(img, resize_w, target_h, FilterType::Triangle);

        if resize_w == max_w {
            return Ok(resized);
        }

        let mut padded = RgbImage::new(max_w, target_h);
        imageops::replace(&mut padded, &resized, 0, 0);
        Ok(padded)
    }
}
