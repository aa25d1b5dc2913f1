//! Mock technical interview engine.
//!
//! * [`session`]: the interview state machine and the follow-up prefetch
//!   scheduler.
//! * [`llm`]: question, evaluation and follow-up generation over an
//!   OpenAI-compatible chat API.
//! * [`stt`]: Whisper transcription of spoken answers.
//! * [`config`]: TOML settings and platform paths.

pub mod config;
pub mod llm;
pub mod session;
pub mod stt;
