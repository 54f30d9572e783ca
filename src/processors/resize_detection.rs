//! Image resizing for the detection model.
//!
//! The detection network requires both dimensions to be multiples of 32.
//! Images larger than the configured bound are scaled down to fit; smaller
//! images are never upscaled, only snapped to the stride.

use crate::core::OcrError;
use image::RgbImage;
use image::imageops::{self, FilterType};

/// Resizes images for the detection model.
///
/// The longest side is bounded by `max_side_len` and both output dimensions
/// are snapped down to multiples of 32 (minimum 32).
#[derive(Debug, Clone)]
pub struct DetResize {
    max_side_len: u32,
}

impl DetResize {
    /// Creates a resizer with the given bound on the longest side.
    pub fn new(max_side_len: u32) -> Self {
        Self { max_side_len }
    }

    /// Resizes an image for detection.
    ///
    /// Returns the resized image together with `(ratio_h, ratio_w)`, the
    /// actual scale factors after stride snapping. The post-processor's
    /// output is mapped back to source coordinates by dividing with these.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a zero-area image.
    pub fn apply(&self, img: &RgbImage) -> Result<(RgbImage, f32, f32), OcrError> {
        let (w, h) = img.dimensions();
        if w == 0 || h == 0 {
            return Err(OcrError::invalid_input(format!(
                "cannot resize an empty image ({w}x{h})"
            )));
        }

        let ratio = if w.max(h) > self.max_side_len {
            self.max_side_len as f32 / w.max(h) as f32
        } else {
            1.0
        };

        let resize_w = snap_to_stride((w as f32 * ratio) as u32);
        let resize_h = snap_to_stride((h as f32 * ratio) as u32);

        let resized = if resize_w == w && resize_h == h {
            img.clone()
        } else {
            imageops::resize(img, resize_w, resize_h, FilterType::Triangle)
        };

        let ratio_h = resize_h as f32 / h as f32;
        let ratio_w = resize_w as f32 / w as f32;
        Ok((resized, ratio_h, ratio_w))
    }
}

/// Snaps a dimension down to a multiple of 32, never below 32.
fn snap_to_stride(dim: u32) -> u32 {
    (dim / 32 * 32).max(32)
}
