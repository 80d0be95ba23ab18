//! Prediction context: owns the model and label map, turns waveforms into words.

use tracing::{debug, info};

use crate::artifacts::{ArtifactPaths, LabelMap};
use crate::features::{FeatureConfig, FeatureExtractor};
use crate::model::{Classifier, ModelOptions, OnnxClassifier};
use crate::types::{ClassifierError, Prediction};

/// Everything a prediction needs, built once and shared read-only.
///
/// Holds no global state; several predictors (different models, different
/// feature settings) can live side by side.
#[derive(Debug)]
pub struct Predictor<C: Classifier = OnnxClassifier> {
    classifier: C,
    labels: LabelMap,
    extractor: FeatureExtractor,
}

impl Predictor<OnnxClassifier> {
    /// Load the ONNX model and the label lookup from disk.
    pub fn load(
        paths: &ArtifactPaths,
        features: FeatureConfig,
        options: &ModelOptions,
    ) -> Result<Self, ClassifierError> {
        let labels = LabelMap::load(&paths.labels)?;
        let classifier = OnnxClassifier::load(&paths.model, options)?;
        let predictor = Self::new(classifier, labels, features)?;
        info!(
            classes = predictor.labels.len(),
            input_shape = ?predictor.extractor.config().input_shape(),
            "predictor ready"
        );
        Ok(predictor)
    }
}

impl<C: Classifier> Predictor<C> {
    /// Assemble a predictor from an already-loaded classifier and label map.
    pub fn new(
        classifier: C,
        labels: LabelMap,
        features: FeatureConfig,
    ) -> Result<Self, ClassifierError> {
        Ok(Self {
            classifier,
            labels,
            extractor: FeatureExtractor::new(features)?,
        })
    }

    /// Predict the spoken word from a JSON array of samples.
    pub fn predict(&self, waveform_json: &str) -> Result<Prediction, ClassifierError> {
        let samples: Vec<f32> = serde_json::from_str(waveform_json)?;
        self.predict_samples(&samples)
    }

    /// Predict the spoken word from samples at the configured sample rate.
    pub fn predict_samples(&self, samples: &[f32]) -> Result<Prediction, ClassifierError> {
        let features = self.extractor.extract(samples)?;
        let class = self.classifier.predict_class(&features)?;
        let label = self
            .labels
            .get(class)
            .ok_or(ClassifierError::UnknownClass(class))?;
        debug!(samples = samples.len(), class, label, "predicted");

        Ok(Prediction {
            what_you_said: label.to_string(),
        })
    }

    /// The class index → label mapping.
    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    /// Feature parameters, including the sample rate callers must supply.
    pub fn feature_config(&self) -> &FeatureConfig {
        self.extractor.config()
    }
}
