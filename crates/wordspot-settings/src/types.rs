//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a settings
//! file may name only the fields it changes.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use wordspot_classifier::{ArtifactPaths, FeatureConfig, ModelOptions};

/// Root settings type.
///
/// ```json
/// {
///   "artifacts": { "modelPath": "./model1.onnx" },
///   "features": { "maxFrames": 32, "overflow": "truncate" },
///   "logging": { "level": "info" }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WordspotSettings {
    /// Where the model and label lookup live.
    pub artifacts: ArtifactSettings,
    /// MFCC parameters; must match what the model was trained on.
    pub features: FeatureConfig,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

/// Artifact locations and session options.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArtifactSettings {
    /// ONNX model file.
    pub model_path: PathBuf,
    /// Label → class index JSON file.
    pub labels_path: PathBuf,
    /// ONNX Runtime intra-op threads.
    pub intra_threads: usize,
}

impl Default for ArtifactSettings {
    fn default() -> Self {
        let paths = ArtifactPaths::default();
        Self {
            model_path: paths.model,
            labels_path: paths.labels,
            intra_threads: ModelOptions::default().intra_threads,
        }
    }
}

impl ArtifactSettings {
    /// Artifact paths for the predictor.
    pub fn paths(&self) -> ArtifactPaths {
        ArtifactPaths {
            model: self.model_path.clone(),
            labels: self.labels_path.clone(),
        }
    }

    /// Session options for the predictor.
    pub fn model_options(&self) -> ModelOptions {
        ModelOptions {
            intra_threads: self.intra_threads,
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level (`error`, `warn`, `info`, `debug`, `trace`) or an `EnvFilter` directive.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}
