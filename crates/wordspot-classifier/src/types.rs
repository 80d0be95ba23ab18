//! Core types for the classifier.

use serde::{Deserialize, Serialize};

/// Result of classifying one waveform.
///
/// Serializes to a single-key object: `{"what-you-said": "cat"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    /// The predicted word.
    #[serde(rename = "what-you-said")]
    pub what_you_said: String,
}

impl Prediction {
    /// Render as a compact JSON object.
    pub fn to_json(&self) -> String {
        serde_json::json!({ "what-you-said": self.what_you_said }).to_string()
    }
}

/// Errors that can occur while loading artifacts or classifying audio.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    /// Model or label file missing or unreadable.
    #[error("artifact not available: {0}")]
    ArtifactNotAvailable(String),

    /// Label lookup file parsed but does not describe a usable mapping.
    #[error("malformed label lookup: {0}")]
    MalformedLabels(String),

    /// Feature parameters that cannot produce a model input.
    #[error("invalid feature config: {0}")]
    InvalidConfig(String),

    /// Waveform payload is not a JSON array of numbers.
    #[error("invalid waveform json: {0}")]
    InvalidWaveform(#[from] serde_json::Error),

    /// Waveform contains no samples.
    #[error("waveform is empty")]
    EmptyWaveform,

    /// Waveform contains NaN or infinity, e.g. a JSON number outside the `f32` range.
    #[error("sample {index} is not a finite number")]
    NonFiniteSample {
        /// Position of the first offending sample.
        index: usize,
    },

    /// Waveform yields more MFCC frames than the model accepts.
    #[error("waveform produces {frames} frames, model accepts at most {max}")]
    TooManyFrames {
        /// Frames the waveform produced.
        frames: usize,
        /// Fixed time width of the model input.
        max: usize,
    },

    /// Model predicted a class index with no label.
    #[error("predicted class {0} has no label")]
    UnknownClass(usize),

    /// ONNX Runtime session creation or inference failure.
    #[error("inference error: {0}")]
    Inference(String),

    /// Audio decoding failure (unsupported format, corrupt data).
    #[error("audio decode error: {0}")]
    AudioDecode(String),

    /// Resampling failure.
    #[error("resample error: {0}")]
    Resample(String),

    /// I/O error (file read/write).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Extension trait to reduce `.map_err()` boilerplate when wrapping errors into `ClassifierError`.
pub trait ResultExt<T> {
    /// Wrap the error as [`ClassifierError::Inference`] with `context` prefix.
    fn inference(self, context: &str) -> Result<T, ClassifierError>;
    /// Wrap the error as [`ClassifierError::AudioDecode`] with `context` prefix.
    fn audio_decode(self, context: &str) -> Result<T, ClassifierError>;
    /// Wrap the error as [`ClassifierError::Resample`] with `context` prefix.
    fn resample(self, context: &str) -> Result<T, ClassifierError>;
    /// Wrap the error as [`ClassifierError::ArtifactNotAvailable`] with `context` prefix.
    fn model(self, context: &str) -> Result<T, ClassifierError>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn inference(self, context: &str) -> Result<T, ClassifierError> {
        self.map_err(|e| ClassifierError::Inference(format!("{context}: {e}")))
    }
    fn audio_decode(self, context: &str) -> Result<T, ClassifierError> {
        self.map_err(|e| ClassifierError::AudioDecode(format!("{context}: {e}")))
    }
    fn resample(self, context: &str) -> Result<T, ClassifierError> {
        self.map_err(|e| ClassifierError::Resample(format!("{context}: {e}")))
    }
    fn model(self, context: &str) -> Result<T, ClassifierError> {
        self.map_err(|e| ClassifierError::ArtifactNotAvailable(format!("{context}: {e}")))
    }
}
