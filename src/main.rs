//! Application entry point: a command-line mock interview.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Parse flags and load [`AppConfig`] (defaults on first run).
//! 3. Build the [`ApiPipeline`] and the Whisper transcriber from config.
//! 4. Start the session and loop: show the question, read an answer (typed
//!    or `/voice <file.wav>`), submit, show feedback.
//!
//! `--save-config` stops after step 2 and writes the effective settings.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use mock_interview::{
    config::{AppConfig, AppPaths},
    llm::{ApiPipeline, PipelineClient},
    session::{Difficulty, Phase, Role, SessionError, SessionStateMachine},
    stt::{ModelPaths, TranscriptionClient, WhisperTranscriber, WHISPER_MODELS},
};

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

/// Practice a technical interview against an LLM interviewer.
///
/// Answer by typing, or record a WAV file and submit it with
/// `/voice <file.wav>`.
#[derive(Parser, Debug)]
#[command(name = "mock-interview")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Company to interview for
    #[arg(short, long)]
    company: Option<String>,

    /// Role to interview for
    #[arg(short, long)]
    role: Option<String>,

    /// Question difficulty (easy, medium, hard)
    #[arg(short, long)]
    difficulty: Option<Difficulty>,

    /// Settings file to use instead of the platform default
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seconds to wait for the background follow-up (0 = sequential)
    #[arg(long)]
    prefetch_wait: Option<u64>,

    /// Write the settings, with flags applied, and exit
    #[arg(long)]
    save_config: bool,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load_from(path)
                .with_context(|| format!("reading {}", path.display()))?,
            None => AppConfig::load().context("reading settings.toml")?,
        };

        if let Some(company) = &self.company {
            config.interview.company_name = company.clone();
        }
        if let Some(role) = &self.role {
            config.interview.role = role.clone();
        }
        if let Some(difficulty) = self.difficulty {
            config.interview.difficulty = difficulty;
        }
        if let Some(secs) = self.prefetch_wait {
            config.session.prefetch_wait_secs = secs;
        }
        Ok(config)
    }

    /// Persist `config` where it was read from.  Returns the path written.
    fn write_config(&self, config: &AppConfig) -> anyhow::Result<PathBuf> {
        match &self.config {
            Some(path) => {
                config
                    .save_to(path)
                    .with_context(|| format!("writing {}", path.display()))?;
                Ok(path.clone())
            }
            None => {
                config.save().context("writing settings.toml")?;
                Ok(AppPaths::new().settings_file)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Input commands
// ---------------------------------------------------------------------------

/// One line of candidate input.
#[derive(Debug, PartialEq)]
enum Input {
    Answer(String),
    Voice(PathBuf),
    Retry,
    History,
    Models,
    Quit,
    Empty,
    Unknown(String),
}

impl Input {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Input::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Input::Answer(line.to_string());
        };

        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };
        match name {
            "voice" if !arg.is_empty() => Input::Voice(PathBuf::from(arg)),
            "retry" => Input::Retry,
            "history" => Input::History,
            "models" => Input::Models,
            "quit" | "exit" => Input::Quit,
            _ => Input::Unknown(line.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Session driving
// ---------------------------------------------------------------------------

struct Frontend {
    session: SessionStateMachine,
    stt: Arc<dyn TranscriptionClient>,
    models: ModelPaths,
    stt_model: String,
    stt_language: String,
}

impl Frontend {
    /// Print the outcome of a session operation.
    fn report(&self, result: Result<(), SessionError>) {
        match result {
            Ok(()) => self.show_turn(),
            Err(e) if e.is_state_error() => {
                log::error!("session: {e}");
                println!("\n[!] {e}");
            }
            Err(e) => {
                log::warn!("session: {e}");
                println!("\n[!] Something went wrong: {e}");
                println!("    Type /retry to try again or /quit to stop.");
            }
        }
    }

    fn show_turn(&self) {
        if let Some(eval) = self.session.last_evaluation() {
            if self.session.phase().accepts_answer() {
                println!("\nVerdict: {}", eval.verdict);
                println!("{}", eval.feedback);
            }
        }
        if let Some(qa) = self.session.current_qa() {
            println!("\nInterviewer: {}", qa.question);
        }
    }

    fn show_history(&self) {
        println!();
        for (i, entry) in self.session.history().iter().enumerate() {
            let who = match entry.role {
                Role::Assistant => "Interviewer",
            };
            println!("{:>3}. {who}: {}", i + 1, entry.content);
        }
    }

    fn show_models(&self) {
        println!();
        for line in model_listing(&self.models, &self.stt_model) {
            println!("{line}");
        }
    }

    async fn submit(&mut self, text: &str) {
        if !self.session.phase().accepts_answer() {
            println!("\n[!] No question is waiting for an answer ({}).", self.session.phase());
            return;
        }
        println!("\nEvaluating your answer...");
        let result = self.session.submit_answer(text).await;
        self.report(result);
    }

    async fn submit_voice(&mut self, path: &Path) {
        if !self.session.phase().accepts_answer() {
            println!("\n[!] No question is waiting for an answer ({}).", self.session.phase());
            return;
        }

        let audio = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                println!("\n[!] Could not read {}: {e}", path.display());
                return;
            }
        };

        println!("\nTranscribing...");
        let stt = Arc::clone(&self.stt);
        let model = self.stt_model.clone();
        let language = self.stt_language.clone();
        let transcript =
            tokio::task::spawn_blocking(move || stt.transcribe(&audio, &model, &language)).await;

        match transcript {
            Ok(Ok(text)) => {
                println!("You said: {text}");
                self.submit(&text).await;
            }
            Ok(Err(e)) => {
                log::warn!("stt: {e}");
                println!("\n[!] {}", e.user_message());
            }
            Err(e) => {
                log::error!("stt: transcription task failed: {e}");
                println!("\n[!] Transcription failed. Please type your answer.");
            }
        }
    }
}

/// One line per registry model: `*` marks the configured one, and models
/// missing from `paths` say where to put the file.
fn model_listing(paths: &ModelPaths, selected: &str) -> Vec<String> {
    WHISPER_MODELS
        .iter()
        .map(|m| {
            let mark = if m.name.eq_ignore_ascii_case(selected.trim()) { '*' } else { ' ' };
            let status = if paths.is_available(m) {
                "installed".to_string()
            } else {
                format!("missing: {}", paths.model_path(m).display())
            };
            format!(
                "{mark} {:<7} ~{:>5} MB  {:<24} [{status}]",
                m.name, m.ram_required_mb, m.summary
            )
        })
        .collect()
}

/// Read one line from stdin without blocking the runtime.  `None` on EOF.
async fn read_line() -> anyhow::Result<Option<String>> {
    let line = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        let n = std::io::stdin().read_line(&mut line)?;
        Ok::<_, std::io::Error>((n > 0).then_some(line))
    })
    .await??;
    Ok(line)
}

fn prompt(phase: Phase) {
    use std::io::Write;

    let marker = match phase {
        Phase::Error => "retry> ",
        _ => "you> ",
    };
    print!("\n{marker}");
    let _ = std::io::stdout().flush();
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 2. Config
    let cli = Cli::parse();
    let config = cli.load_config()?;
    if cli.save_config {
        let path = cli.write_config(&config)?;
        println!("Settings written to {}", path.display());
        return Ok(());
    }
    log::info!(
        "LLM: {} at {} | STT: {} ({})",
        config.llm.model,
        config.llm.base_url,
        config.stt.model,
        config.stt.language
    );

    // 3. Services
    let api = ApiPipeline::from_config(&config.llm);
    if !api.has_web_search() {
        log::info!("pipeline: no search_api_key, research relies on the model alone");
    }
    let pipeline: Arc<dyn PipelineClient> = Arc::new(api);
    let mut transcriber = WhisperTranscriber::new(ModelPaths::new(config.models_dir()));
    if let Some(threads) = config.stt.threads {
        transcriber = transcriber.with_threads(threads);
    }
    let models = transcriber.paths().clone();
    if models.list_local_models().is_empty() {
        log::warn!("stt: no Whisper models in {}", models.models_dir.display());
    }
    let stt: Arc<dyn TranscriptionClient> = Arc::new(transcriber);

    let mut frontend = Frontend {
        session: SessionStateMachine::new(pipeline, config.session.to_settings()),
        stt,
        models,
        stt_model: config.stt.model.clone(),
        stt_language: config.stt.language.clone(),
    };

    // 4. Interview loop
    let interview = config.interview.to_interview_config();
    println!(
        "Mock interview: {} at {} ({})",
        interview.role, interview.company_name, interview.difficulty
    );
    println!("Commands: /voice <file.wav>, /retry, /history, /models, /quit\n");
    println!("Preparing your first question...");
    let result = frontend.session.start(interview).await;
    frontend.report(result);

    loop {
        prompt(frontend.session.phase());
        let Some(line) = read_line().await? else {
            break;
        };

        match Input::parse(&line) {
            Input::Answer(text) => frontend.submit(&text).await,
            Input::Voice(path) => frontend.submit_voice(&path).await,
            Input::Retry => {
                let result = frontend.session.retry().await;
                frontend.report(result);
            }
            Input::History => frontend.show_history(),
            Input::Models => frontend.show_models(),
            Input::Quit => break,
            Input::Empty => println!("Please type an answer, or /quit to stop."),
            Input::Unknown(cmd) => println!("Unknown command: {cmd}"),
        }
    }

    frontend.session.stop();
    println!("\nInterview ended after {} exchanges.", frontend.session.history().len());
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
