//! Whisper model registry and path resolution.
//!
//! Model names follow the standard Whisper sizes (`tiny` … `large`); each
//! maps to a `ggml-<name>.bin` file under the models directory.

use std::path::PathBuf;

// ---------------------------------------------------------------------------
// ModelInfo
// ---------------------------------------------------------------------------

/// Static metadata for a single GGML model file.
#[derive(Debug)]
pub struct ModelInfo {
    /// Name accepted by `TranscriptionClient::transcribe` (e.g. `"base"`).
    pub name: &'static str,
    /// File name under the models directory.
    pub file_name: &'static str,
    /// Approximate RAM needed to run the model (megabytes).
    pub ram_required_mb: u64,
    /// One-line trade-off description listed by `/models`.
    pub summary: &'static str,
}

/// Standard multilingual Whisper models, fastest first.
pub const WHISPER_MODELS: &[ModelInfo] = &[
    ModelInfo {
        name: "tiny",
        file_name: "ggml-tiny.bin",
        ram_required_mb: 1_000,
        summary: "fastest, least accurate",
    },
    ModelInfo {
        name: "base",
        file_name: "ggml-base.bin",
        ram_required_mb: 1_000,
        summary: "balanced (recommended)",
    },
    ModelInfo {
        name: "small",
        file_name: "ggml-small.bin",
        ram_required_mb: 2_000,
        summary: "more accurate",
    },
    ModelInfo {
        name: "medium",
        file_name: "ggml-medium.bin",
        ram_required_mb: 5_000,
        summary: "very accurate",
    },
    ModelInfo {
        name: "large",
        file_name: "ggml-large.bin",
        ram_required_mb: 10_000,
        summary: "most accurate, slowest",
    },
];

/// Find a [`ModelInfo`] by name (case-insensitive).
pub fn find_model(name: &str) -> Option<&'static ModelInfo> {
    WHISPER_MODELS
        .iter()
        .find(|m| m.name.eq_ignore_ascii_case(name.trim()))
}

// ---------------------------------------------------------------------------
// ModelPaths
// ---------------------------------------------------------------------------

/// Resolves the on-disk location of model files.
#[derive(Debug, Clone)]
pub struct ModelPaths {
    /// Directory that contains (or will contain) GGML `.bin` files.
    pub models_dir: PathBuf,
}

impl ModelPaths {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
        }
    }

    /// Full path to the GGML file for the given model.
    pub fn model_path(&self, model: &ModelInfo) -> PathBuf {
        self.models_dir.join(model.file_name)
    }

    /// Returns `true` if the model file exists on disk.
    pub fn is_available(&self, model: &ModelInfo) -> bool {
        self.model_path(model).exists()
    }

    /// All registry models present on disk.
    pub fn list_local_models(&self) -> Vec<&'static ModelInfo> {
        WHISPER_MODELS
            .iter()
            .filter(|m| self.is_available(m))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn finds_models_case_insensitively() {
        assert_eq!(find_model("Base").map(|m| m.file_name), Some("ggml-base.bin"));
        assert!(find_model("huge").is_none());
    }

    #[test]
    fn model_names_are_unique() {
        let mut names: Vec<_> = WHISPER_MODELS.iter().map(|m| m.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), WHISPER_MODELS.len());
    }

    #[test]
    fn lists_only_present_models() {
        let dir = tempdir().expect("temp dir");
        std::fs::write(dir.path().join("ggml-tiny.bin"), b"stub").expect("write");

        let paths = ModelPaths::new(dir.path());
        let local: Vec<_> = paths.list_local_models().iter().map(|m| m.name).collect();
        assert_eq!(local, ["tiny"]);
        assert!(!paths.is_available(find_model("base").unwrap()));
    }
}
