//! The classifier seam and its ONNX Runtime implementation.
//!
//! ONNX tensor shapes use `i64` dimensions while ndarray uses `usize`.
//! These casts are safe because the feature tensor is tiny.
#![allow(clippy::cast_possible_wrap)]

use std::path::Path;
use std::sync::Mutex;

use ndarray::Array4;
use ort::session::Session;
use ort::value::Tensor;
use tracing::{debug, info};

use crate::types::{ClassifierError, ResultExt};

/// A pre-trained model that maps a feature tensor to a class index.
pub trait Classifier: Send + Sync {
    /// Most likely class index for a `[1, n_mfcc, max_frames, 1]` feature tensor.
    fn predict_class(&self, features: &Array4<f32>) -> Result<usize, ClassifierError>;
}

/// ONNX Runtime session options.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelOptions {
    /// Intra-op thread count for the session.
    pub intra_threads: usize,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self { intra_threads: 1 }
    }
}

/// Classifier backed by an ONNX model exported from the trained network.
///
/// The session sits behind a `Mutex` since `Session::run` requires `&mut self`.
pub struct OnnxClassifier {
    session: Mutex<Session>,
}

impl std::fmt::Debug for OnnxClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxClassifier").finish_non_exhaustive()
    }
}

impl OnnxClassifier {
    /// Load the model once. Fails if the file is missing or not a valid ONNX graph.
    pub fn load(path: &Path, options: &ModelOptions) -> Result<Self, ClassifierError> {
        if !path.exists() {
            return Err(ClassifierError::ArtifactNotAvailable(format!(
                "model file not found: {}",
                path.display()
            )));
        }

        info!(path = %path.display(), "loading model");
        let session = Session::builder()
            .model("session builder")?
            .with_intra_threads(options.intra_threads)
            .model("set threads")?
            .commit_from_file(path)
            .model("load model")?;
        debug!(threads = options.intra_threads, "model session ready");

        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

impl Classifier for OnnxClassifier {
    fn predict_class(&self, features: &Array4<f32>) -> Result<usize, ClassifierError> {
        let (batch, coeffs, frames, channels) = features.dim();
        let flat: Vec<f32> = features.iter().copied().collect();
        let input = Tensor::from_array((
            [batch as i64, coeffs as i64, frames as i64, channels as i64],
            flat,
        ))
        .inference("features tensor")?;

        let mut session = self.session.lock().inference("session lock")?;
        let outputs = session
            .run(ort::inputs![input])
            .inference("model run")?;

        let (_, scores) = outputs[0]
            .try_extract_tensor::<f32>()
            .inference("extract scores")?;
        debug!(classes = scores.len(), "model scores");

        class_from_scores(scores)
    }
}

/// Pick the predicted class from the model's output scores.
///
/// A single sigmoid output is a binary classifier: class 1 above 0.5, else 0.
/// Otherwise the highest score wins. Any NaN score is an inference error.
pub fn class_from_scores(scores: &[f32]) -> Result<usize, ClassifierError> {
    if let Some(i) = scores.iter().position(|s| s.is_nan()) {
        return Err(ClassifierError::Inference(format!("model score {i} is NaN")));
    }
    match scores {
        [] => Err(ClassifierError::Inference("model produced no scores".into())),
        [p] => Ok(usize::from(*p > 0.5)),
        _ => Ok(argmax(scores)),
    }
}

/// Index of the maximum value. Ties go to the lowest index.
fn argmax(slice: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in slice.iter().enumerate().skip(1) {
        if v > slice[best] {
            best = i;
        }
    }
    best
}
