//! Spoken-word classifier: waveform in, predicted word out.
//!
//! # Architecture
//!
//! ```text
//! JSON waveform → f32 samples
//! → MFCC [n_mfcc, T] → zero-pad to [n_mfcc, max_frames] → tensor [1, n_mfcc, max_frames, 1]
//! → model1.onnx → class scores → argmax
//! → class_label_lookup.json (inverted) → {"what-you-said": label}
//! ```
//!
//! ## Crate Position
//!
//! Standalone (no wordspot crate dependencies).
//! Depended on by: wordspot-settings, wordspot-cli.

pub mod artifacts;
pub mod audio;
pub mod features;
pub mod model;
pub mod predictor;
pub mod types;

pub use ndarray;

pub use artifacts::{ArtifactPaths, LabelMap};
pub use features::{FeatureConfig, FeatureExtractor, FrameOverflow};
pub use model::{Classifier, ModelOptions, OnnxClassifier};
pub use predictor::Predictor;
pub use types::{ClassifierError, Prediction, ResultExt};
