//! Inference backends for the OCR pipeline.
//!
//! The pipeline never talks to an inference engine directly; it goes through
//! the [`InferenceBackend`] trait, and the concrete implementation is chosen
//! once, at configuration time, via
//! [`BackendKind`](crate::core::config::BackendKind).

mod ort;

pub use ort::{OrtBackend, PooledOrtBackend};

use crate::core::{OcrError, Tensor4D};
use ndarray::ArrayD;

/// A loaded neural network that executes forward passes on supplied tensors.
///
/// Implementations are constructed from a model path by their `load`
/// constructors and must be shareable across threads; `run` takes `&self`
/// and serializes or distributes access internally.
pub trait InferenceBackend: Send + Sync {
    /// Executes one forward pass.
    ///
    /// The input is a batched NCHW tensor. The output keeps whatever shape
    /// the model produces; callers coerce it to the dimensionality they
    /// expect.
    fn run(&self, input: &Tensor4D) -> Result<ArrayD<f32>, OcrError>;

    /// Name identifying the loaded model, for diagnostics.
    fn model_name(&self) -> &str;
}

impl crate::core::config::BackendKind {
    /// Loads a model with the backend implementation this variant selects.
    pub fn load(
        &self,
        model_path: impl AsRef<std::path::Path>,
    ) -> Result<Box<dyn InferenceBackend>, OcrError> {
        match self {
            Self::Single => Ok(Box::new(OrtBackend::load(model_path)?)),
            Self::Pooled { sessions } => {
                Ok(Box::new(PooledOrtBackend::load(model_path, *sessions)?))
            }
        }
    }
}
