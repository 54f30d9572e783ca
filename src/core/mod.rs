//! Core building blocks of the OCR pipeline.
//!
//! Configuration, error types, shared constants, and the inference
//! backend abstraction live here.

pub mod config;
pub mod constants;
pub mod errors;
pub mod inference;

pub use config::{BackendKind, DetectionConfig, EngineConfig, RecognitionConfig};
pub use errors::{OcrError, SimpleError};
pub use inference::{InferenceBackend, OrtBackend, PooledOrtBackend};

/// A 3-dimensional f32 tensor (channel, height, width).
pub type Tensor3D = ndarray::Array3<f32>;

/// A 4-dimensional f32 tensor (batch, channel, height, width).
pub type Tensor4D = ndarray::Array4<f32>;

/// Initializes the tracing subscriber for logging.
///
/// Sets up the subscriber with an environment filter and a formatting layer.
/// Typically called once at the start of an application.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}
