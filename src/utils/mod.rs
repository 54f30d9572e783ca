//! Shared utilities for the OCR pipeline.
//!
//! Character dictionary loading, small numeric helpers, and the perspective
//! rectification used to straighten detected text regions.

pub mod dict;
pub mod math;
pub mod transform;

pub use dict::read_character_dict;
pub use math::{argmax, clampf};
pub use transform::rectify;
