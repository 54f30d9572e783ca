//! The OCR pipeline.
//!
//! Combines preprocessing, the detection and recognition forward passes,
//! and post-processing into a single engine with one entry point per image
//! source.

mod ocr;

pub use ocr::{OcrEngine, OcrEngineBuilder, TextLine};
