//! Configuration for the OCR pipeline.
//!
//! Plain data structs with serde support. Validation happens once, when an
//! engine is constructed, and reports violations as
//! [`OcrError::ConfigError`](crate::core::OcrError::ConfigError).

use crate::core::constants::{
    DEFAULT_BOX_THRESH, DEFAULT_MAX_CANDIDATES, DEFAULT_MAX_SIDE_LEN, DEFAULT_REC_IMAGE_SHAPE,
    DEFAULT_THRESH, DEFAULT_UNCLIP_RATIO,
};
use crate::core::errors::OcrError;
use serde::{Deserialize, Serialize};

/// Parameters for text detection and its post-processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Bound on the longer image side before the detection forward pass.
    pub max_side_len: u32,
    /// Binarization threshold for the probability map.
    pub thresh: f32,
    /// Score threshold below which detected regions are discarded.
    pub box_thresh: f32,
    /// Expansion ratio applied when unclipping detected regions.
    pub unclip_ratio: f32,
    /// Cap on the number of contours considered per image.
    pub max_candidates: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            max_side_len: DEFAULT_MAX_SIDE_LEN,
            thresh: DEFAULT_THRESH,
            box_thresh: DEFAULT_BOX_THRESH,
            unclip_ratio: DEFAULT_UNCLIP_RATIO,
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }
}

/// Parameters for text recognition preprocessing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Input shape (channels, height, width) expected by the recognition model.
    pub image_shape: [usize; 3],
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            image_shape: DEFAULT_REC_IMAGE_SHAPE,
        }
    }
}

/// Which inference backend implementation the engine loads its models with.
///
/// The choice is made here, at configuration time; pipeline code only ever
/// sees the [`InferenceBackend`](crate::core::inference::InferenceBackend)
/// trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BackendKind {
    /// One ONNX Runtime session per model.
    #[default]
    Single,
    /// A pool of sessions per model, dispatched round-robin.
    Pooled {
        /// Number of sessions in the pool.
        sessions: usize,
    },
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Detection parameters.
    pub detection: DetectionConfig,
    /// Recognition parameters.
    pub recognition: RecognitionConfig,
    /// Backend implementation to load models with.
    pub backend: BackendKind,
}

impl EngineConfig {
    /// Checks that every parameter is usable.
    pub fn validate(&self) -> Result<(), OcrError> {
        let det = &self.detection;
        if det.max_side_len < 32 {
            return Err(OcrError::config_error(
                "detection max_side_len must be at least 32",
            ));
        }
        if !(0.0..=1.0).contains(&det.thresh) {
            return Err(OcrError::config_error(
                "detection thresh must be within [0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&det.box_thresh) {
            return Err(OcrError::config_error(
                "detection box_thresh must be within [0, 1]",
            ));
        }
        if !det.unclip_ratio.is_finite() || det.unclip_ratio <= 0.0 {
            return Err(OcrError::config_error(
                "detection unclip_ratio must be positive",
            ));
        }
        if det.max_candidates == 0 {
            return Err(OcrError::config_error(
                "detection max_candidates must be greater than 0",
            ));
        }

        let [channels, height, width] = self.recognition.image_shape;
        if channels != 3 {
            return Err(OcrError::config_error(
                "recognition image_shape must have 3 channels",
            ));
        }
        if height == 0 || width == 0 {
            return Err(OcrError::config_error(
                "recognition image_shape dimensions must be greater than 0",
            ));
        }

        if let BackendKind::Pooled { sessions } = self.backend
            && sessions == 0
        {
            return Err(OcrError::config_error(
                "pooled backend needs at least one session",
            ));
        }

        Ok(())
    }
}
