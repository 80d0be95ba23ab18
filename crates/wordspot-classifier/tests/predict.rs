#![allow(missing_docs, unused_results)]

use std::path::PathBuf;

use wordspot_classifier::ndarray::Array4;
use wordspot_classifier::{
    ArtifactPaths, Classifier, ClassifierError, FeatureConfig, LabelMap, ModelOptions, Predictor,
    audio,
};

/// Picks class 0 when the summed energy coefficient is at the silence floor.
struct EnergyClassifier;

impl Classifier for EnergyClassifier {
    fn predict_class(&self, features: &Array4<f32>) -> Result<usize, ClassifierError> {
        let c0_sum: f32 = features.iter().take(32).sum();
        Ok(if c0_sum < -20_000.0 { 0 } else { 1 })
    }
}

fn write_labels(dir: &std::path::Path) -> PathBuf {
    let path = dir.join(ArtifactPaths::LABELS_FILE);
    std::fs::write(&path, r#"{"silence": 0, "speech": 1}"#).unwrap();
    path
}

fn tone_json(n: usize, amplitude: f32) -> String {
    let samples: Vec<f32> = (0..n)
        .map(|i| amplitude * (i as f32 * 2.0 * std::f32::consts::PI * 440.0 / 16_000.0).sin())
        .collect();
    serde_json::to_string(&samples).unwrap()
}

#[test]
fn prediction_label_comes_from_lookup_file() {
    let tmp = tempfile::tempdir().unwrap();
    let labels = LabelMap::load(&write_labels(tmp.path())).unwrap();
    let predictor = Predictor::new(EnergyClassifier, labels, FeatureConfig::default()).unwrap();

    for json in [tone_json(16_000, 0.0), tone_json(16_000, 0.8), tone_json(300, 0.2)] {
        let prediction = predictor.predict(&json).unwrap();
        assert!(predictor.labels().contains_label(&prediction.what_you_said));

        let wire: serde_json::Value = serde_json::from_str(&prediction.to_json()).unwrap();
        let obj = wire.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert!(obj["what-you-said"].is_string());
    }
}

#[test]
fn silence_and_tone_are_told_apart() {
    let tmp = tempfile::tempdir().unwrap();
    let labels = LabelMap::load(&write_labels(tmp.path())).unwrap();
    let predictor = Predictor::new(EnergyClassifier, labels, FeatureConfig::default()).unwrap();

    assert_eq!(
        predictor.predict(&tone_json(16_000, 0.0)).unwrap().what_you_said,
        "silence"
    );
    assert_eq!(
        predictor.predict(&tone_json(16_000, 0.8)).unwrap().what_you_said,
        "speech"
    );
}

#[test]
fn same_waveform_same_label() {
    let tmp = tempfile::tempdir().unwrap();
    let labels = LabelMap::load(&write_labels(tmp.path())).unwrap();
    let predictor = Predictor::new(EnergyClassifier, labels, FeatureConfig::default()).unwrap();

    let json = tone_json(12_345, 0.4);
    assert_eq!(
        predictor.predict(&json).unwrap(),
        predictor.predict(&json).unwrap()
    );
}

#[test]
fn predictor_is_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Predictor>();
}

/// Optional end-to-end test against real artifacts.
///
/// Run locally with:
/// `WORDSPOT_MODEL_DIR=/path/to/artifacts cargo test -p wordspot-classifier --test predict -- --nocapture`
///
/// The directory must hold `model1.onnx`, `class_label_lookup.json` and
/// `cat.wav`, a short recording of the word "cat".
#[test]
fn model_dir_env_recognizes_cat() {
    let Some(model_dir) = std::env::var_os("WORDSPOT_MODEL_DIR") else {
        eprintln!("skipping: WORDSPOT_MODEL_DIR is not set");
        return;
    };
    let model_dir = PathBuf::from(model_dir);

    let config = FeatureConfig::default();
    let predictor = Predictor::load(
        &ArtifactPaths::from_dir(&model_dir),
        config.clone(),
        &ModelOptions::default(),
    )
    .expect("load predictor");

    let samples = audio::load_file_at(&model_dir.join("cat.wav"), config.sample_rate)
        .expect("load cat.wav");
    let json = serde_json::to_string(&samples).unwrap();

    let prediction = predictor.predict(&json).expect("predict");
    assert_eq!(prediction.to_json(), r#"{"what-you-said":"cat"}"#);
}
