//! Audio file decoding to mono f32, with resampling to the model's rate.

use std::io::Cursor;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

use crate::types::{ClassifierError, ResultExt};

/// Read an audio file as mono f32 samples at its native sample rate.
pub fn load_file(path: &Path) -> Result<(Vec<f32>, u32), ClassifierError> {
    let data = std::fs::read(path)?;
    let extension = path.extension().and_then(|e| e.to_str());
    let (samples, rate) = decode_audio(data, extension)?;
    debug!(
        path = %path.display(),
        samples = samples.len(),
        rate,
        "audio file decoded"
    );
    Ok((samples, rate))
}

/// Read an audio file and bring it to `target_rate`, the rate the features expect.
pub fn load_file_at(path: &Path, target_rate: u32) -> Result<Vec<f32>, ClassifierError> {
    let (samples, rate) = load_file(path)?;
    conform(samples, rate, target_rate)
}

/// Decode audio bytes into mono f32 samples at the native sample rate.
///
/// Supports WAV and other formats via symphonia. Multi-channel audio is
/// averaged down to mono.
pub fn decode_audio(
    data: Vec<u8>,
    extension: Option<&str>,
) -> Result<(Vec<f32>, u32), ClassifierError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        let _ = hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .audio_decode("probe failed")?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| ClassifierError::AudioDecode("no audio track found".into()))?;

    let codec_params = track.codec_params.clone();
    let track_id = track.id;
    let source_rate = codec_params
        .sample_rate
        .ok_or_else(|| ClassifierError::AudioDecode("unknown sample rate".into()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .audio_decode("codec init failed")?;

    let mut all_samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(ClassifierError::AudioDecode(format!("packet read: {e}"))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder.decode(&packet).audio_decode("decode")?;

        let spec = *decoded.spec();
        let channels = spec.channels.count();
        let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        let samples = sample_buf.samples();

        if channels > 1 {
            #[allow(clippy::cast_precision_loss)]
            let scale = 1.0 / channels as f32;
            all_samples.extend(samples.chunks(channels).map(|c| c.iter().sum::<f32>() * scale));
        } else {
            all_samples.extend_from_slice(samples);
        }
    }

    if all_samples.is_empty() {
        return Err(ClassifierError::AudioDecode(
            "no audio samples decoded".into(),
        ));
    }

    Ok((all_samples, source_rate))
}

/// Return `samples` at `to_rate`, resampling only when the rates differ.
pub fn conform(samples: Vec<f32>, from_rate: u32, to_rate: u32) -> Result<Vec<f32>, ClassifierError> {
    if from_rate == to_rate {
        return Ok(samples);
    }
    debug!(from_rate, to_rate, "resampling");
    resample(&samples, from_rate, to_rate)
}

/// Resample mono audio from `from_rate` to `to_rate` using rubato.
///
/// The output has `round(len * to_rate / from_rate)` samples, aligned with the
/// input (the filter delay is trimmed off the front).
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, ClassifierError> {
    use rubato::{
        Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
    };

    if from_rate == 0 || to_rate == 0 {
        return Err(ClassifierError::Resample("sample rate must be positive".into()));
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = f64::from(to_rate) / f64::from(from_rate);
    let chunk_size = 1024;

    let mut resampler =
        SincFixedIn::<f32>::new(ratio, 2.0, params, chunk_size, 1).resample("init")?;

    let expected = (samples.len() as f64 * ratio).round() as usize;
    let delay = resampler.output_delay();
    let mut output = Vec::with_capacity(expected + delay + chunk_size);

    let silence = vec![0.0f32; chunk_size];
    let mut chunks = samples.chunks(chunk_size);
    while output.len() < expected + delay {
        // Pad the last chunk, then keep feeding silence to flush the filter.
        let mut input = chunks.next().map_or_else(|| silence.clone(), <[f32]>::to_vec);
        input.resize(chunk_size, 0.0);

        let waves = vec![input];
        let resampled = resampler.process(&waves, None).resample("process")?;
        if let Some(channel) = resampled.first() {
            output.extend_from_slice(channel);
        }
    }

    output.drain(..delay);
    output.truncate(expected);
    Ok(output)
}
