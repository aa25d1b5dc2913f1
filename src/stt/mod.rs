//! Speech-to-text for spoken answers.
//!
//! # Architecture
//!
//! ```text
//! WAV bytes ──▶ decode_wav ──▶ 16 kHz mono f32 ──▶ WhisperTranscriber ──▶ text
//!               (hound + rubato)                    (cached context per model)
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use mock_interview::stt::{ModelPaths, TranscriptionClient, WhisperTranscriber};
//!
//! let stt = WhisperTranscriber::new(ModelPaths::new("models"));
//! let wav = std::fs::read("answer.wav").unwrap();
//! match stt.transcribe(&wav, "base", "pt") {
//!     Ok(text) => println!("{text}"),
//!     Err(e) => eprintln!("{}", e.user_message()),
//! }
//! ```

pub mod decode;
pub mod engine;
pub mod model;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use decode::{decode_wav, resample_to_16k, stereo_to_mono, WHISPER_SAMPLE_RATE};
pub use engine::{TranscriptionClient, TranscriptionError, WhisperTranscriber, MIN_AUDIO_SAMPLES};
pub use model::{find_model, ModelInfo, ModelPaths, WHISPER_MODELS};

#[cfg(test)]
pub use engine::MockTranscriber;
