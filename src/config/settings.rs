//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::session::{Difficulty, InterviewConfig, SessionSettings};

// ---------------------------------------------------------------------------
// InterviewDefaults
// ---------------------------------------------------------------------------

/// Interview target used when the command line does not override it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterviewDefaults {
    pub company_name: String,
    pub role: String,
    pub difficulty: Difficulty,
}

impl Default for InterviewDefaults {
    fn default() -> Self {
        Self {
            company_name: "Google".into(),
            role: "Junior Data Scientist".into(),
            difficulty: Difficulty::Medium,
        }
    }
}

impl InterviewDefaults {
    pub fn to_interview_config(&self) -> InterviewConfig {
        InterviewConfig::new(&self.company_name, &self.role, self.difficulty)
    }
}

// ---------------------------------------------------------------------------
// LlmConfig
// ---------------------------------------------------------------------------

/// Connection settings for the generation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the API endpoint.
    ///
    /// - Ollama default: `http://localhost:11434`
    /// - OpenAI: `https://api.openai.com`
    pub base_url: String,
    /// API key: `None` for local providers.
    pub api_key: Option<String>,
    /// Model identifier sent to the API (e.g. `"qwen2.5:7b"`, `"gpt-4o-mini"`).
    pub model: String,
    /// Sampling temperature (0.0 – 1.0).
    pub temperature: f32,
    /// Upper bound on reply length.  Model answers can be long.
    pub max_tokens: u32,
    /// Maximum seconds to wait for one reply before timing out.
    pub timeout_secs: u64,
    /// Serper API key for web search during company research.  `None`
    /// skips the search.
    pub search_api_key: Option<String>,
    /// Base URL of the search API.
    pub search_url: String,
    /// How many search results are handed to the research prompt.
    pub search_results: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            api_key: None,
            model: "qwen2.5:7b".into(),
            temperature: 0.7,
            max_tokens: 1024,
            timeout_secs: 120,
            search_api_key: None,
            search_url: "https://google.serper.dev".into(),
            search_results: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// SttConfig
// ---------------------------------------------------------------------------

/// Settings for spoken answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// Whisper model name: `tiny`, `base`, `small`, `medium` or `large`.
    pub model: String,
    /// Spoken language as an ISO-639-1 code, or `"auto"`.
    pub language: String,
    /// Overrides the platform models directory when set.
    pub models_dir: Option<PathBuf>,
    /// Inference threads.  Unset picks one per CPU, at most 8.
    pub threads: Option<i32>,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: "base".into(),
            language: "pt".into(),
            models_dir: None,
            threads: None,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Session engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long the next-question step waits for the background follow-up
    /// before generating one synchronously.  `0` disables the overlap.
    pub prefetch_wait_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            prefetch_wait_secs: 30,
        }
    }
}

impl SessionConfig {
    pub fn to_settings(&self) -> SessionSettings {
        SessionSettings {
            prefetch_wait: Duration::from_secs(self.prefetch_wait_secs),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use mock_interview::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub interview: InterviewDefaults,
    pub llm: LlmConfig,
    pub stt: SttConfig,
    pub session: SessionConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Directory holding the Whisper `ggml-*.bin` files.
    pub fn models_dir(&self) -> PathBuf {
        self.stt
            .models_dir
            .clone()
            .unwrap_or_else(|| AppPaths::new().models_dir)
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
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        assert_eq!(config.llm.model, LlmConfig::default().model);
        assert_eq!(config.session.prefetch_wait_secs, 30);
    }

    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.interview.company_name, "Google");
        assert_eq!(cfg.interview.difficulty, Difficulty::Medium);
        assert_eq!(cfg.llm.base_url, "http://localhost:11434");
        assert!(cfg.llm.api_key.is_none());
        assert!(cfg.llm.search_api_key.is_none());
        assert_eq!(cfg.llm.search_url, "https://google.serper.dev");
        assert_eq!(cfg.stt.model, "base");
        assert_eq!(cfg.stt.language, "pt");
        assert!(cfg.stt.models_dir.is_none());
        assert!(cfg.stt.threads.is_none());
    }

    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("settings.toml");

        let mut cfg = AppConfig::default();
        cfg.interview.company_name = "Nubank".into();
        cfg.interview.difficulty = Difficulty::Hard;
        cfg.llm.base_url = "https://api.openai.com".into();
        cfg.llm.api_key = Some("sk-test".into());
        cfg.llm.model = "gpt-4o-mini".into();
        cfg.stt.models_dir = Some(PathBuf::from("/opt/whisper"));
        cfg.stt.threads = Some(4);
        cfg.session.prefetch_wait_secs = 0;

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.interview.company_name, "Nubank");
        assert_eq!(loaded.interview.difficulty, Difficulty::Hard);
        assert_eq!(loaded.llm.base_url, "https://api.openai.com");
        assert_eq!(loaded.llm.api_key, Some("sk-test".into()));
        assert_eq!(loaded.llm.model, "gpt-4o-mini");
        assert_eq!(loaded.stt.models_dir, Some(PathBuf::from("/opt/whisper")));
        assert_eq!(loaded.stt.threads, Some(4));
        assert_eq!(loaded.session.prefetch_wait_secs, 0);
    }

    /// Sections omitted from the file fall back to their defaults.
    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[interview]\nrole = \"Backend Engineer\"\ndifficulty = \"easy\"\n")
            .expect("write");

        let loaded = AppConfig::load_from(&path).expect("load");
        assert_eq!(loaded.interview.role, "Backend Engineer");
        assert_eq!(loaded.interview.company_name, "Google");
        assert_eq!(loaded.interview.difficulty, Difficulty::Easy);
        assert_eq!(loaded.llm.timeout_secs, LlmConfig::default().timeout_secs);
    }

    #[test]
    fn search_key_is_read_from_llm_section() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[llm]\nsearch_api_key = \"serper-123\"\nsearch_results = 3\n")
            .expect("write");

        let loaded = AppConfig::load_from(&path).expect("load");
        assert_eq!(loaded.llm.search_api_key.as_deref(), Some("serper-123"));
        assert_eq!(loaded.llm.search_results, 3);
        assert_eq!(loaded.llm.search_url, "https://google.serper.dev");
    }

    #[test]
    fn session_config_converts_to_settings() {
        let cfg = SessionConfig {
            prefetch_wait_secs: 5,
        };
        assert_eq!(cfg.to_settings().prefetch_wait, Duration::from_secs(5));
    }

    #[test]
    fn explicit_models_dir_wins() {
        let mut cfg = AppConfig::default();
        cfg.stt.models_dir = Some(PathBuf::from("/tmp/models"));
        assert_eq!(cfg.models_dir(), PathBuf::from("/tmp/models"));
    }
}
