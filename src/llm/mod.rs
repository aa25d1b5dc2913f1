//! LLM-backed generation pipeline for mock interviews.
//!
//! This module provides:
//! * [`PipelineClient`]: async trait for question preparation, answer
//!   evaluation and follow-up generation.
//! * [`ApiPipeline`]: OpenAI-compatible REST implementation.
//! * [`PromptBuilder`]: builds the chat prompts for each call.
//! * [`WebSearch`]: optional Serper search that grounds company research.
//! * [`parse_qa_pair`] / [`parse_evaluation`]: structured reply parsing.
//! * [`PipelineError`]: error variants for pipeline calls.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use mock_interview::config::AppConfig;
//! use mock_interview::llm::{ApiPipeline, PipelineClient};
//! use mock_interview::session::Difficulty;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let pipeline = ApiPipeline::from_config(&config.llm);
//!
//!     let qa = pipeline
//!         .prepare_question("Google", "Data Scientist", Difficulty::Medium)
//!         .await
//!         .unwrap();
//!     println!("{}", qa.question);
//! }
//! ```

pub mod client;
pub mod parse;
pub mod prompt;
pub mod search;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use client::{ApiPipeline, PipelineClient, PipelineError};
pub use parse::{parse_evaluation, parse_qa_pair};
pub use prompt::PromptBuilder;
pub use search::{research_query, SearchHit, WebSearch};

// test-only re-export so the session tests can script pipeline replies.
#[cfg(test)]
pub use client::{ScriptedPipeline, ScriptedReply};
