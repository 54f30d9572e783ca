//! Image processing stages for the OCR pipeline.
//!
//! Everything between a decoded image and the final text lines lives here:
//! resizing and normalization ahead of the models, geometry primitives, DB
//! detection post-processing, and CTC decoding of recognition output.
//!
//! # Modules
//!
//! * `db_postprocess` - DB detection map to text-region quadrilaterals
//! * `decode` - CTC greedy decoding of recognition logits
//! * `geometry` - Points, polygons, minimum-area rectangles
//! * `normalization` - Mean/scale normalization into NCHW tensors
//! * `resize_detection` - Stride-aligned resizing for the detection model
//! * `resize_recognition` - Fixed-height resize and pad for recognition

pub mod db_postprocess;
mod decode;
mod geometry;
mod normalization;
pub mod resize_detection;
pub mod resize_recognition;

pub use db_postprocess::*;
pub use decode::*;
pub use geometry::*;
pub use normalization::*;
pub use resize_detection::*;
pub use resize_recognition::*;
