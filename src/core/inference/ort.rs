//! ONNX Runtime implementations of [`InferenceBackend`].

use super::InferenceBackend;
use crate::core::errors::{OcrError, SimpleError};
use crate::core::Tensor4D;
use ndarray::{ArrayD, IxDyn};
use ort::logging::LogLevel;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

fn model_name_from_path(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown_model")
        .to_string()
}

fn load_session(path: &Path, model_name: &str) -> Result<Session, OcrError> {
    Session::builder()?
        .with_log_level(LogLevel::Error)?
        .commit_from_file(path)
        .map_err(|e| {
            OcrError::inference_error(
                model_name,
                format!("loading model from '{}'", path.display()),
                e,
            )
        })
}

/// Reads the primary input/output tensor names from session metadata.
fn discover_io_names(session: &Session, model_name: &str) -> Result<(String, String), OcrError> {
    let input_name = session
        .inputs
        .first()
        .map(|i| i.name.clone())
        .ok_or_else(|| {
            OcrError::invalid_input(format!("model '{model_name}' declares no inputs"))
        })?;
    let output_name = session
        .outputs
        .first()
        .map(|o| o.name.clone())
        .ok_or_else(|| {
            OcrError::invalid_input(format!("model '{model_name}' declares no outputs"))
        })?;
    Ok((input_name, output_name))
}

fn run_session(
    session: &Mutex<Session>,
    input_name: &str,
    output_name: &str,
    model_name: &str,
    x: &Tensor4D,
) -> Result<ArrayD<f32>, OcrError> {
    let input_tensor = TensorRef::from_array_view(x.view()).map_err(|e| {
        OcrError::inference_error(model_name, "converting input tensor", e)
    })?;
    let inputs = ort::inputs![input_name => input_tensor];

    let mut guard = session.lock().map_err(|_| {
        OcrError::inference_error(
            model_name,
            "acquiring session lock",
            SimpleError::new("session lock poisoned"),
        )
    })?;
    let outputs = guard
        .run(inputs)
        .map_err(|e| OcrError::inference_error(model_name, "forward pass", e))?;

    let (shape, data) = outputs[output_name]
        .try_extract_tensor::<f32>()
        .map_err(|e| {
            OcrError::inference_error(
                model_name,
                format!("extracting output tensor '{output_name}' as f32"),
                e,
            )
        })?;
    let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
    Ok(ArrayD::from_shape_vec(IxDyn(&dims), data.to_vec())?)
}

/// Single-session ONNX Runtime backend.
///
/// One session per model, guarded by a mutex since `Session::run` needs
/// exclusive access.
pub struct OrtBackend {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    model_path: PathBuf,
    model_name: String,
}

impl OrtBackend {
    /// Loads a model from an ONNX file.
    pub fn load(model_path: impl AsRef<Path>) -> Result<Self, OcrError> {
        let path = model_path.as_ref();
        let model_name = model_name_from_path(path);
        let session = load_session(path, &model_name)?;
        let (input_name, output_name) = discover_io_names(&session, &model_name)?;
        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            model_path: path.to_path_buf(),
            model_name,
        })
    }

    /// Path the model was loaded from.
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}

impl InferenceBackend for OrtBackend {
    fn run(&self, input: &Tensor4D) -> Result<ArrayD<f32>, OcrError> {
        run_session(
            &self.session,
            &self.input_name,
            &self.output_name,
            &self.model_name,
            input,
        )
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

impl std::fmt::Debug for OrtBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrtBackend")
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .field("model_path", &self.model_path)
            .field("model_name", &self.model_name)
            .finish()
    }
}

/// Session-pool ONNX Runtime backend.
///
/// Holds several sessions over the same model and dispatches calls
/// round-robin, so concurrent callers do not serialize on a single session.
pub struct PooledOrtBackend {
    sessions: Vec<Mutex<Session>>,
    next_idx: AtomicUsize,
    input_name: String,
    output_name: String,
    model_path: PathBuf,
    model_name: String,
}

impl PooledOrtBackend {
    /// Loads a model into a pool of `sessions` sessions (at least one).
    pub fn load(model_path: impl AsRef<Path>, sessions: usize) -> Result<Self, OcrError> {
        let path = model_path.as_ref();
        let model_name = model_name_from_path(path);
        let pool_size = sessions.max(1);
        let mut pool = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            pool.push(Mutex::new(load_session(path, &model_name)?));
        }
        let (input_name, output_name) = {
            let first = pool[0].lock().map_err(|_| {
                OcrError::inference_error(
                    &model_name,
                    "acquiring session lock",
                    SimpleError::new("session lock poisoned"),
                )
            })?;
            discover_io_names(&first, &model_name)?
        };
        Ok(Self {
            sessions: pool,
            next_idx: AtomicUsize::new(0),
            input_name,
            output_name,
            model_path: path.to_path_buf(),
            model_name,
        })
    }

    /// Path the model was loaded from.
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Number of sessions in the pool.
    pub fn pool_size(&self) -> usize {
        self.sessions.len()
    }
}

impl InferenceBackend for PooledOrtBackend {
    fn run(&self, input: &Tensor4D) -> Result<ArrayD<f32>, OcrError> {
        let idx = self.next_idx.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        run_session(
            &self.sessions[idx],
            &self.input_name,
            &self.output_name,
            &self.model_name,
            input,
        )
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

impl std::fmt::Debug for PooledOrtBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledOrtBackend")
            .field("sessions", &self.sessions.len())
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .field("model_path", &self.model_path)
            .field("model_name", &self.model_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_fails_for_missing_model() {
        let result = OrtBackend::load("definitely/not/a/model.onnx");
        assert!(result.is_err());
    }

    #[test]
    fn pooled_load_fails_for_missing_model() {
        let result = PooledOrtBackend::load("definitely/not/a/model.onnx", 2);
        assert!(result.is_err());
    }

    #[test]
    fn model_name_is_derived_from_file_stem() {
        assert_eq!(
            model_name_from_path(Path::new("models/det_server.onnx")),
            "det_server"
        );
    }
}
