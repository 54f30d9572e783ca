//! # Skiff OCR
//!
//! A Rust OCR library that extracts text from images using ONNX models.
//! Detection finds text regions, each region is rectified to a horizontal
//! strip, and recognition decodes it to text with a confidence score.
//!
//! ## Features
//!
//! - Complete pipeline from image file or bytes to structured text lines
//! - DB-style detection post-processing with polygon unclipping
//! - Perspective rectification of skewed text regions
//! - CTC greedy decoding against a caller-supplied character dictionary
//! - ONNX Runtime inference, single-session or session-pooled
//! - C-compatible boundary for embedding in non-Rust hosts
//!
//! ## Modules
//!
//! * [`core`] - Configuration, errors, and inference backends
//! * [`ffi`] - The C boundary
//! * [`pipeline`] - The end-to-end engine and its builder
//! * [`processors`] - Pre- and post-processing stages
//! * [`utils`] - Dictionary loading and perspective rectification
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use skiff_ocr::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! skiff_ocr::core::init_tracing();
//!
//! let engine = OcrEngineBuilder::new(
//!     "models/detection.onnx",
//!     "models/recognition.onnx",
//!     "models/dict.txt",
//! )
//! .build()?;
//!
//! for line in engine.run("document.jpg")? {
//!     println!("{:.2} {}", line.confidence, line.text);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Tuning the pipeline
//!
//! ```rust,no_run
//! use skiff_ocr::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = OcrEngineBuilder::new("det.onnx", "rec.onnx", "dict.txt")
//!     .detection_config(DetectionConfig {
//!         box_thresh: 0.6,
//!         ..DetectionConfig::default()
//!     })
//!     .backend(BackendKind::Pooled { sessions: 2 })
//!     .build()?;
//! # let _ = engine;
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod ffi;
pub mod pipeline;
pub mod processors;
pub mod utils;

/// Prelude module for convenient imports.
///
/// Bring the essentials into scope with a single use statement:
///
/// ```rust
/// use skiff_ocr::prelude::*;
/// ```
///
/// Included items cover the common path: the engine and its builder, the
/// result and configuration types, and the error type. For individual
/// processing stages or custom backends, import directly from the
/// respective modules (e.g. `skiff_ocr::processors`,
/// `skiff_ocr::core::inference`).
pub mod prelude {
    pub use crate::core::{
        BackendKind, DetectionConfig, EngineConfig, InferenceBackend, OcrError, RecognitionConfig,
    };
    pub use crate::pipeline::{OcrEngine, OcrEngineBuilder, TextLine};
    pub use crate::processors::Quadrilateral;
}
