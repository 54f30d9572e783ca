//! The OCR engine: detection, rectification, and recognition in sequence.

use crate::core::constants::{DET_MEAN, DET_SCALE, REC_MEAN, REC_SCALE};
use crate::core::{
    BackendKind, DetectionConfig, EngineConfig, InferenceBackend, OcrError, RecognitionConfig,
};
use crate::processors::{
    CtcLabelDecode, DbPostProcess, DetResize, NormalizeImage, Quadrilateral, RecResize,
};
use crate::utils::{read_character_dict, rectify};
use image::RgbImage;
use ndarray::{Axis, Ix3, Ix4};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// One recognized line of text.
///
/// Serializes to the shape the C boundary emits: the detected region under
/// the key `box`, the decoded text, and the mean per-character confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextLine {
    /// The detected region, as four corner points in source-image pixels.
    #[serde(rename = "box")]
    pub bounding_box: Quadrilateral,
    /// The decoded text. Empty when no step produced a character.
    pub text: String,
    /// Mean confidence over the contributing steps, `0.0` when none did.
    pub confidence: f32,
}

/// The complete text recognition pipeline.
///
/// Owns the two model backends, the configured processing stages, and a run
/// lock that serializes whole-image calls. Construction goes through
/// [`OcrEngineBuilder`] for the common case of loading models from disk, or
/// through [`OcrEngine::with_backends`] when the backends are built
/// elsewhere.
pub struct OcrEngine {
    detection: Box<dyn InferenceBackend>,
    recognition: Box<dyn InferenceBackend>,
    det_resize: DetResize,
    det_normalize: NormalizeImage,
    rec_resize: RecResize,
    rec_normalize: NormalizeImage,
    post_process: DbPostProcess,
    decoder: CtcLabelDecode,
    run_lock: Mutex<()>,
}

impl fmt::Debug for OcrEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OcrEngine")
            .field("detection", &self.detection.model_name())
            .field("recognition", &self.recognition.model_name())
            .field("characters", &self.decoder.character_count())
            .finish_non_exhaustive()
    }
}

impl OcrEngine {
    /// Assembles an engine from already-loaded backends.
    ///
    /// `character_list` holds the dictionary entries in class order; the
    /// engine appends the recognition model's reserved trailing class here.
    /// The configuration is validated before anything is built.
    pub fn with_backends(
        detection: Box<dyn InferenceBackend>,
        recognition: Box<dyn InferenceBackend>,
        mut character_list: Vec<String>,
        config: EngineConfig,
    ) -> Result<Self, OcrError> {
        config.validate()?;

        // Reserved final class slot; the decoder never emits it.
        character_list.push(" ".to_string());

        let det = &config.detection;
        Ok(Self {
            detection,
            recognition,
            det_resize: DetResize::new(det.max_side_len),
            det_normalize: NormalizeImage::new(DET_MEAN, DET_SCALE, true)?,
            rec_resize: RecResize::new(config.recognition.image_shape)?,
            rec_normalize: NormalizeImage::new(REC_MEAN, REC_SCALE, true)?,
            post_process: DbPostProcess::new(
                det.thresh,
                det.box_thresh,
                det.unclip_ratio,
                det.max_candidates,
            ),
            decoder: CtcLabelDecode::new(character_list),
            run_lock: Mutex::new(()),
        })
    }

    /// Recognizes all text lines in the image at `image_path`.
    ///
    /// Calls are serialized on the engine's run lock. Results preserve the
    /// order in which regions were discovered on the detection map.
    ///
    /// # Errors
    ///
    /// Returns [`OcrError::ImageLoad`] when the file cannot be decoded, and
    /// propagates any backend failure, which aborts the whole call.
    pub fn run(&self, image_path: impl AsRef<Path>) -> Result<Vec<TextLine>, OcrError> {
        let _guard = self.lock_run();
        let img = image::open(image_path.as_ref())
            .map_err(OcrError::ImageLoad)?
            .to_rgb8();
        self.run_on_image(&img)
    }

    /// Recognizes all text lines in an encoded image held in memory.
    ///
    /// Identical to [`run`](Self::run) apart from the image source.
    pub fn run_bytes(&self, bytes: &[u8]) -> Result<Vec<TextLine>, OcrError> {
        let _guard = self.lock_run();
        let img = image::load_from_memory(bytes)
            .map_err(OcrError::ImageLoad)?
            .to_rgb8();
        self.run_on_image(&img)
    }

    /// Acquires the run lock. The lock guards no data, so a guard from a
    /// poisoned lock is still usable.
    fn lock_run(&self) -> std::sync::MutexGuard<'_, ()> {
        self.run_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn run_on_image(&self, img: &RgbImage) -> Result<Vec<TextLine>, OcrError> {
        let (resized, ratio_h, ratio_w) = self.det_resize.apply(img)?;
        let det_input = self.det_normalize.apply(&resized);

        let det_output = self.detection.run(&det_input)?;
        let det_output = det_output.into_dimensionality::<Ix4>()?;
        let (batch, channels, _, _) = det_output.dim();
        if batch == 0 || channels == 0 {
            return Err(OcrError::invalid_input("empty detection output"));
        }
        let pred = det_output.index_axis(Axis(0), 0);
        let pred = pred.index_axis(Axis(0), 0);

        let boxes = self.post_process.apply(&pred);
        debug!("detected {} candidate regions", boxes.len());

        let mut lines = Vec::with_capacity(boxes.len());
        for bbox in boxes {
            let mapped = bbox.rescale(ratio_w, ratio_h);
            let region = match rectify(img, &mapped) {
                Ok(region) => region,
                Err(err) => {
                    debug!("skipping degenerate region: {err}");
                    continue;
                }
            };

            let rec_input = self.rec_normalize.apply(&self.rec_resize.apply(&region)?);
            let rec_output = self.recognition.run(&rec_input)?;
            let rec_output = rec_output.into_dimensionality::<Ix3>()?;
            if rec_output.dim().0 == 0 {
                return Err(OcrError::invalid_input("empty recognition output"));
            }
            let probs = rec_output.index_axis(Axis(0), 0);
            let (text, confidence) = self.decoder.decode(&probs);

            lines.push(TextLine {
                bounding_box: mapped,
                text,
                confidence,
            });
        }

        info!("recognized {} text lines", lines.len());
        Ok(lines)
    }
}

/// Builder that loads the models and dictionary from disk.
#[derive(Debug, Clone)]
pub struct OcrEngineBuilder {
    detection_model: PathBuf,
    recognition_model: PathBuf,
    character_dict: PathBuf,
    config: EngineConfig,
}

impl OcrEngineBuilder {
    /// Creates a builder from the three required file paths, with default
    /// parameters for everything else.
    pub fn new(
        detection_model: impl Into<PathBuf>,
        recognition_model: impl Into<PathBuf>,
        character_dict: impl Into<PathBuf>,
    ) -> Self {
        Self {
            detection_model: detection_model.into(),
            recognition_model: recognition_model.into(),
            character_dict: character_dict.into(),
            config: EngineConfig::default(),
        }
    }

    /// Sets the detection parameters.
    pub fn detection_config(mut self, detection: DetectionConfig) -> Self {
        self.config.detection = detection;
        self
    }

    /// Sets the recognition parameters.
    pub fn recognition_config(mut self, recognition: RecognitionConfig) -> Self {
        self.config.recognition = recognition;
        self
    }

    /// Selects the inference backend implementation.
    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.config.backend = backend;
        self
    }

    /// Reads the dictionary, loads both models, and assembles the engine.
    ///
    /// # Errors
    ///
    /// Fails if the dictionary is missing or empty, if either model cannot
    /// be loaded, or if the configuration is invalid.
    pub fn build(self) -> Result<OcrEngine, OcrError> {
        let character_list = read_character_dict(&self.character_dict)?;
        debug!(
            "loaded character dictionary from {} ({} entries)",
            self.character_dict.display(),
            character_list.len()
        );

        debug!(
            "loading detection model from {}",
            self.detection_model.display()
        );
        let detection = self.config.backend.load(&self.detection_model)?;
        debug!(
            "loading recognition model from {}",
            self.recognition_model.display()
        );
        let recognition = self.config.backend.load(&self.recognition_model)?;

        OcrEngine::with_backends(detection, recognition, character_list, self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Tensor4D;
    use image::Rgb;
    use ndarray::{ArrayD, IxDyn};

    struct FakeBackend {
        name: &'static str,
        respond: Box<dyn Fn(&Tensor4D) -> Result<ArrayD<f32>, OcrError> + Send + Sync>,
    }

    impl InferenceBackend for FakeBackend {
        fn run(&self, input: &Tensor4D) -> Result<ArrayD<f32>, OcrError> {
            (self.respond)(input)
        }

        fn model_name(&self) -> &str {
            self.name
        }
    }

    /// Detection fake that fills a [1, 1, H, W] map from a per-pixel score
    /// function, matching the input's spatial dimensions.
    fn detection_backend(
        score: impl Fn(usize, usize) -> f32 + Send + Sync + 'static,
    ) -> Box<dyn InferenceBackend> {
        Box::new(FakeBackend {
            name: "det",
            respond: Box::new(move |input| {
                let (_, _, height, width) = input.dim();
                let mut out = ArrayD::zeros(IxDyn(&[1, 1, height, width]));
                for y in 0..height {
                    for x in 0..width {
                        out[[0, 0, y, x]] = score(x, y);
                    }
                }
                Ok(out)
            }),
        })
    }

    /// Recognition fake that returns fixed [1, T, C] probabilities.
    fn recognition_backend(steps: Vec<Vec<f32>>) -> Box<dyn InferenceBackend> {
        Box::new(FakeBackend {
            name: "rec",
            respond: Box::new(move |_| {
                let classes = steps[0].len();
                let mut out = ArrayD::zeros(IxDyn(&[1, steps.len(), classes]));
                for (t, step) in steps.iter().enumerate() {
                    for (c, &p) in step.iter().enumerate() {
                        out[[0, t, c]] = p;
                    }
                }
                Ok(out)
            }),
        })
    }

    fn failing_backend(name: &'static str) -> Box<dyn InferenceBackend> {
        Box::new(FakeBackend {
            name,
            respond: Box::new(move |_| {
                Err(OcrError::inference_error(
                    name,
                    "forward pass",
                    crate::core::SimpleError::new("fake failure"),
                ))
            }),
        })
    }

    fn white_image_png(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("input.png");
        let mut img = RgbImage::new(64, 64);
        for pixel in img.pixels_mut() {
            *pixel = Rgb([255, 255, 255]);
        }
        img.save(&path).unwrap();
        path
    }

    fn blob_score(x: usize, y: usize) -> f32 {
        if (8..40).contains(&x) && (16..40).contains(&y) {
            0.9
        } else {
            0.0
        }
    }

    #[test]
    fn blank_map_yields_no_text_lines() {
        let engine = OcrEngine::with_backends(
            detection_backend(|_, _| 0.0),
            failing_backend("rec"),
            vec!["a".to_string()],
            EngineConfig::default(),
        )
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = white_image_png(&dir);

        let lines = engine.run(&path).unwrap();
        assert!(lines.is_empty());
    }

    #[test]
    fn single_blob_produces_one_decoded_line() {
        // Steps decode to "a" then "b" then blank.
        let steps = vec![
            vec![0.0, 0.9, 0.0, 0.0],
            vec![0.0, 0.0, 0.7, 0.0],
            vec![0.9, 0.0, 0.0, 0.0],
        ];
        let engine = OcrEngine::with_backends(
            detection_backend(blob_score),
            recognition_backend(steps),
            vec!["a".to_string(), "b".to_string()],
            EngineConfig::default(),
        )
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = white_image_png(&dir);

        let lines = engine.run(&path).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "ab");
        assert!((lines[0].confidence - 0.8).abs() < 1e-6);

        let quad = &lines[0].bounding_box;
        for [x, y] in quad.points {
            assert!((0..=64).contains(&x), "x out of bounds: {x}");
            assert!((0..=64).contains(&y), "y out of bounds: {y}");
        }
        assert!(quad.points[0][0] <= quad.points[1][0]);
        assert!(quad.points[0][1] <= quad.points[3][1]);
    }

    #[test]
    fn run_bytes_accepts_encoded_images() {
        let engine = OcrEngine::with_backends(
            detection_backend(|_, _| 0.0),
            failing_backend("rec"),
            vec!["a".to_string()],
            EngineConfig::default(),
        )
        .unwrap();

        let mut img = RgbImage::new(64, 64);
        for pixel in img.pixels_mut() {
            *pixel = Rgb([255, 255, 255]);
        }
        let mut bytes = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Png,
        )
        .unwrap();

        let lines = engine.run_bytes(&bytes).unwrap();
        assert!(lines.is_empty());
    }

    #[test]
    fn detection_failure_aborts_before_recognition() {
        let engine = OcrEngine::with_backends(
            failing_backend("det"),
            recognition_backend(vec![vec![0.0, 1.0]]),
            vec!["a".to_string()],
            EngineConfig::default(),
        )
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = white_image_png(&dir);

        let result = engine.run(&path);
        assert!(matches!(result, Err(OcrError::Inference { .. })));
    }

    #[test]
    fn recognition_failure_aborts_and_releases_the_lock() {
        let engine = OcrEngine::with_backends(
            detection_backend(blob_score),
            failing_backend("rec"),
            vec!["a".to_string()],
            EngineConfig::default(),
        )
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = white_image_png(&dir);

        assert!(engine.run(&path).is_err());
        // The second call must reacquire the lock and fail the same way,
        // not deadlock.
        assert!(engine.run(&path).is_err());
    }

    #[test]
    fn unreadable_image_is_an_image_load_error() {
        let engine = OcrEngine::with_backends(
            detection_backend(|_, _| 0.0),
            failing_backend("rec"),
            vec!["a".to_string()],
            EngineConfig::default(),
        )
        .unwrap();

        let result = engine.run("/nonexistent/image.png");
        assert!(matches!(result, Err(OcrError::ImageLoad(_))));
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let mut config = EngineConfig::default();
        config.detection.thresh = 1.5;

        let result = OcrEngine::with_backends(
            detection_backend(|_, _| 0.0),
            failing_backend("rec"),
            vec!["a".to_string()],
            config,
        );
        assert!(matches!(result, Err(OcrError::ConfigError { .. })));
    }

    #[test]
    fn builder_fails_on_missing_dictionary() {
        let result = OcrEngineBuilder::new("det.onnx", "rec.onnx", "/nonexistent/dict.txt").build();
        assert!(result.is_err());
    }

    #[test]
    fn text_line_serializes_with_box_key() {
        let line = TextLine {
            bounding_box: Quadrilateral::new([[0, 0], [5, 0], [5, 5], [0, 5]]),
            text: "hi".to_string(),
            confidence: 0.5,
        };

        let value = serde_json::to_value(&line).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "box": [[0, 0], [5, 0], [5, 5], [0, 5]],
                "text": "hi",
                "confidence": 0.5,
            })
        );
    }
}
