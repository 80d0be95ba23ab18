//! MFCC feature extraction into the fixed-shape model input.
//!
//! Follows the common librosa defaults so a model trained on those features
//! sees the same numbers: centered reflect-padded frames, periodic Hann
//! window, power spectrum, Slaney mel filterbank, dB with an 80 dB floor,
//! orthonormal DCT-II.
//!
//! Sample counts and bin indices are converted to `f64` for the DSP math;
//! all of them are far below 2^52.
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]

use std::f64::consts::PI;
use std::sync::Arc;

use ndarray::{Array2, Array4, s};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::ClassifierError;

/// Smallest power value before taking the log.
const AMIN: f64 = 1e-10;

/// What to do when a waveform yields more frames than the model accepts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameOverflow {
    /// Fail with [`ClassifierError::TooManyFrames`].
    #[default]
    Reject,
    /// Keep the first `max_frames` frames.
    Truncate,
}

/// Feature extraction parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeatureConfig {
    /// Sample rate the model was trained at, in Hz.
    pub sample_rate: u32,
    /// Cepstral coefficients kept per frame.
    pub n_mfcc: usize,
    /// Fixed time width of the model input.
    pub max_frames: usize,
    /// FFT window length.
    pub n_fft: usize,
    /// Samples between successive frames.
    pub hop_length: usize,
    /// Mel bands before the DCT.
    pub n_mels: usize,
    /// Dynamic range kept below the loudest bin, in dB.
    pub top_db: f64,
    /// Policy for waveforms longer than `max_frames`.
    pub overflow: FrameOverflow,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            n_mfcc: 20,
            max_frames: 32,
            n_fft: 2048,
            hop_length: 512,
            n_mels: 128,
            top_db: 80.0,
            overflow: FrameOverflow::Reject,
        }
    }
}

impl FeatureConfig {
    /// Shape of the tensor handed to the model: `[1, n_mfcc, max_frames, 1]`.
    pub fn input_shape(&self) -> [usize; 4] {
        [1, self.n_mfcc, self.max_frames, 1]
    }

    /// Longest waveform, in samples, that fits in `max_frames` frames.
    pub fn max_samples(&self) -> usize {
        (self.max_frames * self.hop_length).saturating_sub(1)
    }

    /// Reject parameters that cannot produce a model input.
    pub fn validate(&self) -> Result<(), ClassifierError> {
        let invalid = |msg: &str| Err(ClassifierError::InvalidConfig(msg.to_string()));
        if self.sample_rate == 0 {
            return invalid("sample_rate must be positive");
        }
        if self.n_fft < 2 || self.hop_length == 0 || self.max_frames == 0 {
            return invalid("n_fft, hop_length and max_frames must be positive");
        }
        if self.n_mfcc == 0 || self.n_mfcc > self.n_mels {
            return invalid("n_mfcc must be between 1 and n_mels");
        }
        if self.top_db.is_nan() || self.top_db < 0.0 {
            return invalid("top_db must be non-negative");
        }
        Ok(())
    }
}

/// Waveform → `[1, n_mfcc, max_frames, 1]` tensor.
///
/// Window, filterbank, DCT basis and FFT plan are built once in [`FeatureExtractor::new`].
pub struct FeatureExtractor {
    config: FeatureConfig,
    window: Vec<f64>,
    mel_basis: Array2<f64>,
    dct_basis: Array2<f64>,
    fft: Arc<dyn Fft<f64>>,
}

impl std::fmt::Debug for FeatureExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureExtractor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FeatureExtractor {
    /// Precompute the DSP tables for `config`.
    pub fn new(config: FeatureConfig) -> Result<Self, ClassifierError> {
        config.validate()?;
        let window = hann_window(config.n_fft);
        let mel_basis = slaney_mel_filterbank(
            f64::from(config.sample_rate),
            config.n_fft,
            config.n_mels,
            0.0,
            f64::from(config.sample_rate) / 2.0,
        );
        let dct_basis = dct_ortho_basis(config.n_mfcc, config.n_mels);
        let fft = FftPlanner::new().plan_fft_forward(config.n_fft);
        Ok(Self {
            config,
            window,
            mel_basis,
            dct_basis,
            fft,
        })
    }

    /// Configuration this extractor was built with.
    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Frames a centered STFT produces for `n_samples` samples.
    pub fn frame_count(&self, n_samples: usize) -> usize {
        1 + n_samples / self.config.hop_length
    }

    /// MFCC matrix of shape `[n_mfcc, frames]`, unpadded.
    pub fn mfcc(&self, samples: &[f32]) -> Result<Array2<f32>, ClassifierError> {
        check_samples(samples)?;
        let power = self.power_spectrogram(samples, self.frame_count(samples.len()));
        let mel = self.mel_basis.dot(&power);
        let db = power_to_db(&mel, self.config.top_db);
        Ok(self.dct_basis.dot(&db).mapv(|v| v as f32))
    }

    /// Model input tensor: MFCCs zero-padded (or truncated) to `max_frames`.
    pub fn extract(&self, samples: &[f32]) -> Result<Array4<f32>, ClassifierError> {
        check_samples(samples)?;

        let max = self.config.max_frames;
        let frames = self.frame_count(samples.len());
        let kept = if frames > max {
            match self.config.overflow {
                FrameOverflow::Reject => {
                    return Err(ClassifierError::TooManyFrames { frames, max });
                }
                FrameOverflow::Truncate => {
                    debug!(frames, max, "truncating waveform to model width");
                    max
                }
            }
        } else {
            frames
        };

        let mfcc = self.mfcc(samples)?;
        debug!(shape = ?mfcc.shape(), "mfcc computed");

        let n_mfcc = self.config.n_mfcc;
        let mut padded = Array2::<f32>::zeros((n_mfcc, max));
        padded
            .slice_mut(s![.., ..kept])
            .assign(&mfcc.slice(s![.., ..kept]));

        padded
            .into_shape_with_order((1, n_mfcc, max, 1))
            .map_err(|e| ClassifierError::Inference(format!("reshape features: {e}")))
    }

    /// Power spectrogram of shape `[n_fft / 2 + 1, frames]`.
    fn power_spectrogram(&self, samples: &[f32], frames: usize) -> Array2<f64> {
        let n_fft = self.config.n_fft;
        let hop = self.config.hop_length;
        let n_bins = n_fft / 2 + 1;
        let pad = (n_fft / 2) as isize;
        let len = samples.len() as isize;

        let mut spec = Array2::<f64>::zeros((n_bins, frames));
        let mut buffer = vec![Complex::new(0.0, 0.0); n_fft];

        for t in 0..frames {
            let start = (t * hop) as isize - pad;
            for (i, slot) in buffer.iter_mut().enumerate() {
                let idx = reflect_index(start + i as isize, len);
                *slot = Complex::new(f64::from(samples[idx]) * self.window[i], 0.0);
            }
            self.fft.process(&mut buffer);
            for (k, c) in buffer.iter().take(n_bins).enumerate() {
                spec[[k, t]] = c.norm_sqr();
            }
        }

        spec
    }
}

/// Non-finite samples turn the whole spectrum into NaN, which the dB floor would hide.
fn check_samples(samples: &[f32]) -> Result<(), ClassifierError> {
    if samples.is_empty() {
        return Err(ClassifierError::EmptyWaveform);
    }
    match samples.iter().position(|s| !s.is_finite()) {
        Some(index) => Err(ClassifierError::NonFiniteSample { index }),
        None => Ok(()),
    }
}

/// Map an index into `[0, len)` by mirroring at the edges without repeating the edge sample.
fn reflect_index(i: isize, len: isize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len - 1);
    let mut m = i.rem_euclid(period);
    if m >= len {
        m = period - m;
    }
    m as usize
}

/// Periodic Hann window.
fn hann_window(length: usize) -> Vec<f64> {
    (0..length)
        .map(|n| 0.5 * (1.0 - (2.0 * PI * n as f64 / length as f64).cos()))
        .collect()
}

/// Slaney mel scale: linear below 1 kHz, logarithmic above.
fn hz_to_mel(hz: f64) -> f64 {
    let f_sp = 200.0 / 3.0;
    let min_log_hz = 1000.0;
    let min_log_mel = min_log_hz / f_sp;
    let logstep = 6.4f64.ln() / 27.0;

    if hz >= min_log_hz {
        min_log_mel + (hz / min_log_hz).ln() / logstep
    } else {
        hz / f_sp
    }
}

fn mel_to_hz(mel: f64) -> f64 {
    let f_sp = 200.0 / 3.0;
    let min_log_hz = 1000.0;
    let min_log_mel = min_log_hz / f_sp;
    let logstep = 6.4f64.ln() / 27.0;

    if mel >= min_log_mel {
        min_log_hz * (logstep * (mel - min_log_mel)).exp()
    } else {
        f_sp * mel
    }
}

/// Slaney-normalized triangular filterbank, shape `[n_mels, n_fft / 2 + 1]`.
fn slaney_mel_filterbank(
    sample_rate: f64,
    n_fft: usize,
    n_mels: usize,
    f_min: f64,
    f_max: f64,
) -> Array2<f64> {
    let n_bins = n_fft / 2 + 1;
    let fft_freqs: Vec<f64> = (0..n_bins)
        .map(|k| k as f64 * sample_rate / n_fft as f64)
        .collect();

    let mel_min = hz_to_mel(f_min);
    let mel_max = hz_to_mel(f_max);
    let mel_f: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_min + i as f64 * (mel_max - mel_min) / (n_mels + 1) as f64))
        .collect();

    let mut weights = Array2::<f64>::zeros((n_mels, n_bins));
    for m in 0..n_mels {
        let lower_width = mel_f[m + 1] - mel_f[m];
        let upper_width = mel_f[m + 2] - mel_f[m + 1];
        let enorm = 2.0 / (mel_f[m + 2] - mel_f[m]);
        for (k, &freq) in fft_freqs.iter().enumerate() {
            let lower = (freq - mel_f[m]) / lower_width;
            let upper = (mel_f[m + 2] - freq) / upper_width;
            weights[[m, k]] = lower.min(upper).max(0.0) * enorm;
        }
    }
    weights
}

/// Orthonormal DCT-II basis, shape `[n_out, n_in]`.
fn dct_ortho_basis(n_out: usize, n_in: usize) -> Array2<f64> {
    let n = n_in as f64;
    Array2::from_shape_fn((n_out, n_in), |(k, i)| {
        let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
        scale * (PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n)).cos()
    })
}

/// Power to decibels relative to 1.0, floored at `max - top_db`.
fn power_to_db(power: &Array2<f64>, top_db: f64) -> Array2<f64> {
    let db = power.mapv(|p| 10.0 * p.max(AMIN).log10());
    let peak = db.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let floor = peak - top_db;
    db.mapv(|v| v.max(floor))
}
