//! # wordspot
//!
//! Loads the model and label lookup once, then classifies each audio file
//! given on the command line, printing one `{"what-you-said": ...}` line per file.

#![deny(unsafe_code)]

mod logging;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use wordspot_classifier::{Classifier, Prediction, Predictor, audio};
use wordspot_settings::{WordspotSettings, load_settings_from_path, settings_path};

/// Recordings classified when no files are given (cat, right, eight).
const DEMO_FILES: &[&str] = &[
    "../data/6b81fead_nohash_0.wav",
    "../data/ff2b842e_nohash_2.wav",
    "../data/ccb1266b_nohash_1.wav",
];

/// Classify the spoken word in short audio clips.
#[derive(Parser, Debug)]
#[command(name = "wordspot", about = "Classify the spoken word in short audio clips")]
struct Cli {
    /// Audio files to classify. Defaults to the bundled demo recordings.
    files: Vec<PathBuf>,

    /// ONNX model (overrides settings).
    #[arg(long)]
    model: Option<PathBuf>,

    /// Label → class index JSON (overrides settings).
    #[arg(long)]
    labels: Option<PathBuf>,

    /// Settings file.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log level or `EnvFilter` directive (overrides settings).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Fold command-line overrides into loaded settings.
    fn apply(&self, settings: &mut WordspotSettings) {
        if let Some(model) = &self.model {
            settings.artifacts.model_path.clone_from(model);
        }
        if let Some(labels) = &self.labels {
            settings.artifacts.labels_path.clone_from(labels);
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
    }

    fn input_files(&self) -> Vec<PathBuf> {
        if self.files.is_empty() {
            DEMO_FILES.iter().map(PathBuf::from).collect()
        } else {
            self.files.clone()
        }
    }
}

/// Decode one file at the model's rate, hand it to the predictor as JSON.
fn classify_file<C: Classifier>(predictor: &Predictor<C>, path: &Path) -> Result<Prediction> {
    let rate = predictor.feature_config().sample_rate;
    let samples = audio::load_file_at(path, rate)
        .with_context(|| format!("failed to load {}", path.display()))?;
    let waveform = serde_json::to_string(&samples).context("failed to encode waveform")?;
    predictor
        .predict(&waveform)
        .with_context(|| format!("failed to classify {}", path.display()))
}

/// Classify every file, returning how many failed.
fn classify_all<C: Classifier>(predictor: &Predictor<C>, files: &[PathBuf]) -> usize {
    let mut failures = 0;
    for path in files {
        match classify_file(predictor, path) {
            Ok(prediction) => {
                tracing::info!(path = %path.display(), word = %prediction.what_you_said, "classified");
                println!("{}", prediction.to_json());
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %format!("{e:#}"), "classification failed");
                failures += 1;
            }
        }
    }
    failures
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let settings_file = cli.settings.clone().unwrap_or_else(settings_path);
    let mut settings = load_settings_from_path(&settings_file)
        .with_context(|| format!("failed to load settings from {}", settings_file.display()))?;
    cli.apply(&mut settings);

    logging::init_subscriber(&settings.logging.level);

    let predictor = Predictor::load(
        &settings.artifacts.paths(),
        settings.features.clone(),
        &settings.artifacts.model_options(),
    )
    .context("failed to load model artifacts")?;

    let files = cli.input_files();
    let failures = classify_all(&predictor, &files);

    if failures > 0 {
        tracing::warn!(failures, total = files.len(), "some files could not be classified");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use wordspot_classifier::{ClassifierError, FeatureConfig, LabelMap};
    use wordspot_classifier::ndarray::Array4;

    use super::*;

    #[derive(Debug)]
    struct FixedClassifier(usize);

    impl Classifier for FixedClassifier {
        fn predict_class(&self, _features: &Array4<f32>) -> Result<usize, ClassifierError> {
            Ok(self.0)
        }
    }

    fn predictor() -> Predictor<FixedClassifier> {
        let labels = LabelMap::from_json(r#"{"cat": 0, "eight": 1, "right": 2}"#).unwrap();
        Predictor::new(FixedClassifier(0), labels, FeatureConfig::default()).unwrap()
    }

    fn write_wav(path: &Path, sample_rate: u32, num_samples: u32) {
        let data_size = num_samples * 2;
        let mut buf = Vec::new();
        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&(36 + data_size).to_le_bytes());
        buf.extend_from_slice(b"WAVEfmt ");
        buf.extend_from_slice(&16u32.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
        buf.extend_from_slice(&1u16.to_le_bytes()); // mono
        buf.extend_from_slice(&sample_rate.to_le_bytes());
        buf.extend_from_slice(&(sample_rate * 2).to_le_bytes());
        buf.extend_from_slice(&2u16.to_le_bytes());
        buf.extend_from_slice(&16u16.to_le_bytes());
        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&data_size.to_le_bytes());
        for i in 0..num_samples {
            let v = ((i % 100) as i16 - 50) * 100;
            buf.extend_from_slice(&v.to_le_bytes());
        }
        std::fs::write(path, buf).unwrap();
    }

    #[test]
    fn cli_parses_files_and_overrides() {
        let cli = Cli::try_parse_from([
            "wordspot",
            "--model",
            "/m/model1.onnx",
            "--log-level",
            "debug",
            "a.wav",
            "b.wav",
        ])
        .unwrap();
        assert_eq!(cli.files, [PathBuf::from("a.wav"), PathBuf::from("b.wav")]);

        let mut settings = WordspotSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.artifacts.model_path, PathBuf::from("/m/model1.onnx"));
        assert_eq!(
            settings.artifacts.labels_path,
            PathBuf::from("./class_label_lookup.json")
        );
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn no_files_falls_back_to_demo_recordings() {
        let cli = Cli::try_parse_from(["wordspot"]).unwrap();
        let files = cli.input_files();
        assert_eq!(files.len(), 3);
        assert_eq!(files[0], PathBuf::from("../data/6b81fead_nohash_0.wav"));
    }

    #[test]
    fn classify_file_reads_and_predicts() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cat.wav");
        write_wav(&path, 16_000, 16_000);

        let prediction = classify_file(&predictor(), &path).unwrap();
        assert_eq!(prediction.what_you_said, "cat");
    }

    #[test]
    fn classify_file_resamples_native_rate() {
        // 0.5s at 44.1kHz is 8000 samples at 16kHz, well within the model width.
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("hi-rate.wav");
        write_wav(&path, 44_100, 22_050);

        assert!(classify_file(&predictor(), &path).is_ok());
    }

    #[test]
    fn classify_all_counts_failures() {
        let tmp = tempfile::tempdir().unwrap();
        let good = tmp.path().join("good.wav");
        write_wav(&good, 16_000, 8000);
        let too_long = tmp.path().join("long.wav");
        write_wav(&too_long, 16_000, 32_000);
        let missing = tmp.path().join("missing.wav");

        let failures = classify_all(&predictor(), &[good, too_long, missing]);
        assert_eq!(failures, 2);
    }
}
