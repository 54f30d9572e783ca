//! Image normalization for the detection and recognition models.
//!
//! Normalization folds `(value / 255 - mean) * scale` into one fused
//! multiply-add per sample by precomputing per-channel `alpha`/`beta`
//! coefficients, then rearranges the interleaved samples into the planar
//! layout the inference backends expect.

use crate::core::{OcrError, Tensor4D};
use image::RgbImage;

/// Normalizes images into model input range.
///
/// Holds the precomputed per-channel coefficients so that each sample costs
/// a single `value * alpha[c] + beta[c]`.
#[derive(Debug, Clone)]
pub struct NormalizeImage {
    /// Per-channel multiplier (`scale / 255` when inputs are rescaled to [0, 1]).
    alpha: [f32; 3],
    /// Per-channel offset (`-mean * scale`).
    beta: [f32; 3],
}

impl NormalizeImage {
    /// Creates a normalizer from per-channel mean and scale.
    ///
    /// When `is_scale` is set, samples are first mapped from `[0, 255]` to
    /// `[0, 1]`; the division is folded into `alpha`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any mean or scale entry is non-finite, or if
    /// the folded coefficients end up non-finite.
    pub fn new(mean: [f32; 3], scale: [f32; 3], is_scale: bool) -> Result<Self, OcrError> {
        for (i, &m) in mean.iter().enumerate() {
            if !m.is_finite() {
                return Err(OcrError::config_error(format!(
                    "normalization mean at index {i} is not finite: {m}"
                )));
            }
        }
        for (i, &s) in scale.iter().enumerate() {
            if !s.is_finite() {
                return Err(OcrError::config_error(format!(
                    "normalization scale at index {i} is not finite: {s}"
                )));
            }
        }

        let mut alpha = [0.0f32; 3];
        let mut beta = [0.0f32; 3];
        for c in 0..3 {
            alpha[c] = if is_scale {
                scale[c] / 255.0
            } else {
                scale[c]
            };
            beta[c] = -mean[c] * scale[c];
            if !alpha[c].is_finite() || !beta[c].is_finite() {
                return Err(OcrError::config_error(format!(
                    "normalization coefficients at index {c} are not finite"
                )));
            }
        }

        Ok(Self { alpha, beta })
    }

    /// Normalizes an image into interleaved (HWC) `f32` samples.
    pub fn normalize(&self, img: &RgbImage) -> Vec<f32> {
        let mut out = Vec::with_capacity((img.width() * img.height() * 3) as usize);
        for pixel in img.pixels() {
            for c in 0..3 {
                out.push(pixel[c] as f32 * self.alpha[c] + self.beta[c]);
            }
        }
        out
    }

    /// Normalizes an image and permutes it into a `(1, 3, H, W)` tensor.
    pub fn apply(&self, img: &RgbImage) -> Tensor4D {
        let hwc = self.normalize(img);
        permute_to_chw(&hwc, img.height() as usize, img.width() as usize)
    }
}

/// Rearranges interleaved (HWC) samples into a planar `(1, 3, H, W)` tensor.
///
/// Pure layout transform; assumes `hwc` holds exactly `height * width * 3`
/// samples.
pub fn permute_to_chw(hwc: &[f32], height: usize, width: usize) -> Tensor4D {
    debug_assert_eq!(hwc.len(), height * width * 3);

    let mut tensor = Tensor4D::zeros((1, 3, height, width));
    for y in 0..height {
        for x in 0..width {
            let base = (y * width + x) * 3;
            for c in 0..3 {
                tensor[[0, c, y, x]] = hwc[base + c];
            }
        }
    }
    tensor
}
