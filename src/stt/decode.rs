//! WAV decoding into the 16 kHz mono `f32` PCM Whisper expects.
//!
//! 1. [`hound`] parses the RIFF container (16/24/32-bit int or 32-bit float).
//! 2. [`stereo_to_mono`] averages interleaved channels.
//! 3. [`resample_to_16k`] converts the sample rate with a `rubato` sinc
//!    resampler.

use std::io::Cursor;

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::stt::engine::TranscriptionError;

/// Sample rate Whisper is trained on.
pub const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// Decode a WAV recording into 16 kHz mono samples in `[-1.0, 1.0]`.
///
/// # Errors
///
/// [`TranscriptionError::UnsupportedFormat`] when the bytes are not a WAV
/// file hound can read, or use a sample layout other than int/float PCM.
pub fn decode_wav(bytes: &[u8]) -> Result<Vec<f32>, TranscriptionError> {
    let reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| TranscriptionError::UnsupportedFormat(e.to_string()))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Float, 32) => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| TranscriptionError::UnsupportedFormat(e.to_string()))?,
        (hound::SampleFormat::Int, bits @ 8..=32) => {
            let scale = (1i64 << (bits - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| TranscriptionError::UnsupportedFormat(e.to_string()))?
        }
        (format, bits) => {
            return Err(TranscriptionError::UnsupportedFormat(format!(
                "{bits}-bit {format:?} samples"
            )))
        }
    };

    let mono = stereo_to_mono(&interleaved, spec.channels);
    resample_to_16k(&mono, spec.sample_rate)
}

/// Mix interleaved multi-channel audio down to mono by averaging channels.
///
/// # Example
///
/// ```rust
/// use mock_interview::stt::stereo_to_mono;
///
/// let stereo = vec![0.5_f32, -0.5, 0.2, 0.4]; // L R L R
/// let mono = stereo_to_mono(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[1] - 0.3).abs() < 1e-6);
/// ```
pub fn stereo_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

/// Resample mono `samples` from `source_rate` Hz to 16 kHz.
///
/// Already-16 kHz and empty input are returned unchanged.
pub fn resample_to_16k(samples: &[f32], source_rate: u32) -> Result<Vec<f32>, TranscriptionError> {
    if source_rate == WHISPER_SAMPLE_RATE || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    if source_rate == 0 {
        return Err(TranscriptionError::UnsupportedFormat("sample rate of 0 Hz".into()));
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let ratio = WHISPER_SAMPLE_RATE as f64 / source_rate as f64;

    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, samples.len(), 1)
        .map_err(|e| TranscriptionError::Failed(format!("resampler setup: {e}")))?;
    let mut channels = resampler
        .process(&[samples], None)
        .map_err(|e| TranscriptionError::Failed(format!("resampling: {e}")))?;

    Ok(channels.pop().unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
