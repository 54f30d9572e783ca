//! Constants used throughout the OCR pipeline.
//!
//! Default processing parameters and the fixed normalization conventions of
//! the detection and recognition models.

/// The default bound on the longer image side for detection.
///
/// Images whose longer side exceeds this are scaled down before the
/// detection forward pass; smaller images pass through unscaled.
pub const DEFAULT_MAX_SIDE_LEN: u32 = 960;

/// The default binarization threshold for the detection probability map.
pub const DEFAULT_THRESH: f32 = 0.3;

/// The default score threshold below which detected regions are discarded.
pub const DEFAULT_BOX_THRESH: f32 = 0.5;

/// The default expansion ratio applied when unclipping detected regions.
pub const DEFAULT_UNCLIP_RATIO: f32 = 2.0;

/// The default cap on the number of contours considered per image.
pub const DEFAULT_MAX_CANDIDATES: usize = 1000;

/// The default shape (channels, height, width) for recognition input.
pub const DEFAULT_REC_IMAGE_SHAPE: [usize; 3] = [3, 48, 320];

/// Per-channel mean for detection input normalization (ImageNet convention).
pub const DET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Per-channel scale for detection input normalization (reciprocal std).
pub const DET_SCALE: [f32; 3] = [1.0 / 0.229, 1.0 / 0.224, 1.0 / 0.225];

/// Per-channel mean for recognition input normalization.
pub const REC_MEAN: [f32; 3] = [0.5, 0.5, 0.5];

/// Per-channel scale for recognition input normalization.
pub const REC_SCALE: [f32; 3] = [1.0 / 0.5, 1.0 / 0.5, 1.0 / 0.5];
