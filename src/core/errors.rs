//! Error types for the OCR pipeline.

use thiserror::Error;

/// Errors surfaced by the pipeline and its components.
///
/// Degenerate geometry (a contour too small, a rejected score, a failed
/// polygon offset) is not an error: those candidates are skipped silently.
/// Everything that reaches a caller does so through this type.
#[derive(Error, Debug)]
pub enum OcrError {
    /// The image bytes could not be decoded.
    #[error("image load")]
    ImageLoad(#[source] image::ImageError),

    /// Input that violates a precondition (empty image, malformed box, ...).
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Description of the violated precondition.
        message: String,
    },

    /// Invalid configuration detected at construction time.
    #[error("configuration: {message}")]
    ConfigError {
        /// Description of the invalid setting.
        message: String,
    },

    /// A model forward pass failed.
    #[error("inference failed for {model}: {context}")]
    Inference {
        /// Name of the model that failed.
        model: String,
        /// What was being attempted.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error from the ONNX Runtime session.
    #[error(transparent)]
    Session(#[from] ort::Error),

    /// Error from tensor operations.
    #[error("tensor operation")]
    Tensor(#[from] ndarray::ShapeError),

    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),
}

impl OcrError {
    /// Creates an [`OcrError::InvalidInput`] from a message.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        OcrError::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates an [`OcrError::ConfigError`] from a message.
    pub fn config_error(message: impl Into<String>) -> Self {
        OcrError::ConfigError {
            message: message.into(),
        }
    }

    /// Creates an [`OcrError::Inference`] wrapping the underlying error.
    pub fn inference_error(
        model: impl Into<String>,
        context: impl Into<String>,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        OcrError::Inference {
            model: model.into(),
            context: context.into(),
            source: Box::new(error),
        }
    }
}

/// Minimal string-backed error for failure sites with no richer source,
/// such as a poisoned lock.
#[derive(Debug)]
pub struct SimpleError {
    message: String,
}

impl SimpleError {
    /// Creates a new error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SimpleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SimpleError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_message_is_preserved() {
        let err = OcrError::invalid_input("empty image");
        assert_eq!(err.to_string(), "invalid input: empty image");
    }

    #[test]
    fn inference_error_carries_model_and_source() {
        let err = OcrError::inference_error("det", "forward pass", SimpleError::new("boom"));
        assert_eq!(err.to_string(), "inference failed for det: forward pass");
        let source = std::error::Error::source(&err);
        assert_eq!(source.map(|s| s.to_string()).as_deref(), Some("boom"));
    }
}
