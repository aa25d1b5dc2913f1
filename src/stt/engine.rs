//! Transcription client trait and the Whisper-backed implementation.
//!
//! # Overview
//!
//! [`TranscriptionClient`] is the interface the front end uses to turn a
//! recorded answer into text before handing it to the session.  It is
//! object-safe and `Send + Sync` so one instance can be shared by every
//! session behind an `Arc<dyn TranscriptionClient>`.
//!
//! [`WhisperTranscriber`] is the production implementation.  It decodes WAV
//! bytes, loads the requested GGML model on first use and keeps the loaded
//! context for later calls.
//!
//! [`MockTranscriber`] (available under `#[cfg(test)]`) returns a canned
//! response without touching any model file.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::stt::decode::{decode_wav, WHISPER_SAMPLE_RATE};
use crate::stt::model::{find_model, ModelInfo, ModelPaths};

// ---------------------------------------------------------------------------
// TranscriptionError
// ---------------------------------------------------------------------------

/// All errors that can arise from transcription.
#[derive(Debug, Clone, Error)]
pub enum TranscriptionError {
    /// A model file is absent or the Whisper runtime failed to load it.
    #[error("missing runtime dependency: {0}")]
    MissingDependency(String),

    /// The model name is not one of the known Whisper sizes.
    #[error("unknown Whisper model '{0}' (expected tiny, base, small, medium or large)")]
    UnknownModel(String),

    /// The bytes are not a WAV file or use an unsupported sample layout.
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// The recording was too short or produced an empty transcript.
    #[error("speech could not be recognised")]
    Unrecognized,

    /// Inference itself failed.
    #[error("transcription failed: {0}")]
    Failed(String),
}

impl TranscriptionError {
    /// Message suitable for showing to the candidate.
    pub fn user_message(&self) -> String {
        match self {
            TranscriptionError::MissingDependency(what) => format!(
                "Voice input is unavailable on this machine ({what}). Please type your answer."
            ),
            TranscriptionError::UnknownModel(_) => {
                format!("{self}. Check the [stt] section of your settings.")
            }
            TranscriptionError::UnsupportedFormat(_) => {
                "That recording is not a WAV file we can read. Please try again.".into()
            }
            TranscriptionError::Unrecognized => {
                "Sorry, your speech could not be recognised. Please try again.".into()
            }
            TranscriptionError::Failed(_) => {
                "Transcription failed. Please try again or type your answer.".into()
            }
        }
    }

    /// `true` when retrying with the same setup cannot succeed.
    pub fn is_missing_dependency(&self) -> bool {
        matches!(
            self,
            TranscriptionError::MissingDependency(_) | TranscriptionError::UnknownModel(_)
        )
    }
}

// ---------------------------------------------------------------------------
// TranscriptionClient trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface for speech-to-text.
///
/// The call is blocking; async callers go through
/// `tokio::task::spawn_blocking`.
pub trait TranscriptionClient: Send + Sync {
    /// Transcribe a recorded answer.
    ///
    /// * `audio`: the raw recording (WAV container).
    /// * `model_name`: Whisper model size, e.g. `"base"`.
    /// * `language`: ISO-639-1 hint, or `"auto"`/empty to detect.
    fn transcribe(
        &self,
        audio: &[u8],
        model_name: &str,
        language: &str,
    ) -> Result<String, TranscriptionError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn TranscriptionClient>) {}
};

/// Minimum recording length: 0.5 s at 16 kHz.
pub const MIN_AUDIO_SAMPLES: usize = WHISPER_SAMPLE_RATE as usize / 2;

// ---------------------------------------------------------------------------
// WhisperTranscriber
// ---------------------------------------------------------------------------

/// Production [`TranscriptionClient`] backed by `whisper-rs`.
///
/// Contexts are loaded lazily per model and shared; every call creates its
/// own `WhisperState`, so concurrent calls only contend on the cache lock
/// while looking up the context.
pub struct WhisperTranscriber {
    paths: ModelPaths,
    n_threads: i32,
    contexts: Mutex<HashMap<&'static str, Arc<WhisperContext>>>,
}

impl std::fmt::Debug for WhisperTranscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperTranscriber")
            .field("paths", &self.paths)
            .field("n_threads", &self.n_threads)
            .finish_non_exhaustive()
    }
}

// SAFETY: whisper-rs declares WhisperContext Send + Sync; the weights are
// read-only after loading and all mutable inference state lives in the
// per-call WhisperState.
unsafe impl Send for WhisperTranscriber {}
unsafe impl Sync for WhisperTranscriber {}

impl WhisperTranscriber {
    pub fn new(paths: ModelPaths) -> Self {
        Self {
            paths,
            n_threads: optimal_threads(),
            contexts: Mutex::new(HashMap::new()),
        }
    }

    /// Override the number of inference threads (default: CPU count, max 8).
    pub fn with_threads(mut self, n_threads: i32) -> Self {
        self.n_threads = n_threads.max(1);
        self
    }

    pub fn paths(&self) -> &ModelPaths {
        &self.paths
    }

    /// Transcribe already-decoded 16 kHz mono samples.
    pub fn transcribe_samples(
        &self,
        samples: &[f32],
        model_name: &str,
        language: &str,
    ) -> Result<String, TranscriptionError> {
        if samples.len() < MIN_AUDIO_SAMPLES {
            log::debug!("stt: recording too short ({} samples)", samples.len());
            return Err(TranscriptionError::Unrecognized);
        }

        let model = find_model(model_name)
            .ok_or_else(|| TranscriptionError::UnknownModel(model_name.to_string()))?;
        let ctx = self.context(model)?;

        let mut fp = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        let language = language.trim();
        let hint = if language.is_empty() || language.eq_ignore_ascii_case("auto") {
            None
        } else {
            Some(language)
        };
        fp.set_language(hint);
        fp.set_n_threads(self.n_threads);
        fp.set_print_progress(false);
        fp.set_print_realtime(false);

        let mut state = ctx
            .create_state()
            .map_err(|e| TranscriptionError::MissingDependency(e.to_string()))?;

        let started = std::time::Instant::now();
        state
            .full(fp, samples)
            .map_err(|e| TranscriptionError::Failed(e.to_string()))?;

        let n_segments = state
            .full_n_segments()
            .map_err(|e| TranscriptionError::Failed(e.to_string()))?;

        let mut text = String::new();
        for i in 0..n_segments {
            let segment = state
                .full_get_segment_text(i)
                .map_err(|e| TranscriptionError::Failed(format!("segment {i}: {e}")))?;
            text.push_str(&segment);
        }

        let text = text.trim().to_string();
        log::info!(
            "stt: {} model transcribed {:.1}s of audio in {}ms ({} chars)",
            model.name,
            samples.len() as f32 / WHISPER_SAMPLE_RATE as f32,
            started.elapsed().as_millis(),
            text.chars().count()
        );

        if text.is_empty() {
            return Err(TranscriptionError::Unrecognized);
        }
        Ok(text)
    }

    /// Return the cached context for `model`, loading it on first use.
    fn context(
        &self,
        model: &'static ModelInfo,
    ) -> Result<Arc<WhisperContext>, TranscriptionError> {
        let mut cache = self
            .contexts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(ctx) = cache.get(model.name) {
            return Ok(Arc::clone(ctx));
        }

        let path = self.paths.model_path(model);
        if !path.exists() {
            return Err(TranscriptionError::MissingDependency(format!(
                "Whisper model file not found: {}",
                path.display()
            )));
        }
        let path_str = path.to_str().ok_or_else(|| {
            TranscriptionError::MissingDependency(format!(
                "model path contains non-UTF-8 characters: {}",
                path.display()
            ))
        })?;

        log::info!("stt: loading {} model from {}", model.name, path.display());
        let ctx = WhisperContext::new_with_params(path_str, WhisperContextParameters::default())
            .map_err(|e| {
                TranscriptionError::MissingDependency(format!("{}: {e}", model.file_name))
            })?;

        let ctx = Arc::new(ctx);
        cache.insert(model.name, Arc::clone(&ctx));
        Ok(ctx)
    }
}

impl TranscriptionClient for WhisperTranscriber {
    fn transcribe(
        &self,
        audio: &[u8],
        model_name: &str,
        language: &str,
    ) -> Result<String, TranscriptionError> {
        let samples = decode_wav(audio)?;
        self.transcribe_samples(&samples, model_name, language)
    }
}

/// Number of CPU threads to hand to Whisper, capped at 8.
pub(crate) fn optimal_threads() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8) as i32)
        .unwrap_or(4)
}

// ---------------------------------------------------------------------------
// MockTranscriber  (test-only)
// ---------------------------------------------------------------------------

/// A test double that returns a pre-configured response.
#[cfg(test)]
pub struct MockTranscriber {
    response: Result<String, TranscriptionError>,
}

#[cfg(test)]
impl MockTranscriber {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            response: Ok(text.into()),
        }
    }

    pub fn err(error: TranscriptionError) -> Self {
        Self {
            response: Err(error),
        }
    }
}

#[cfg(test)]
impl TranscriptionClient for MockTranscriber {
    fn transcribe(
        &self,
        audio: &[u8],
        _model_name: &str,
        _language: &str,
    ) -> Result<String, TranscriptionError> {
        // Still validate the container so callers are tested against it.
        decode_wav(audio)?;
        self.response.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
