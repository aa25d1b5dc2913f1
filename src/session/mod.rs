//! Interview session engine.
//!
//! # Architecture
//!
//! ```text
//! front end (CLI / UI)
//!        │  start / submit_answer / retry / stop
//!        ▼
//! SessionStateMachine ── owns ──▶ InterviewSession
//!        │                         (phase, current question, history,
//!        │                          prefetch slot)
//!        ├─▶ PipelineClient        question / evaluation / fallback follow-up
//!        └─▶ PrefetchScheduler ──spawn──▶ follow-up task ──oneshot──▶ PrefetchHandle
//! ```
//!
//! The prefetch starts as soon as a question becomes current, so the next
//! question is usually ready by the time the candidate's answer has been
//! evaluated.

pub mod error;
pub mod machine;
pub mod prefetch;
pub mod state;
pub mod types;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use error::{PrefetchError, SessionError};
pub use machine::{SessionSettings, SessionStateMachine};
pub use prefetch::{PrefetchHandle, PrefetchScheduler, PrefetchState};
pub use state::{InterviewSession, Phase};
pub use types::{
    Difficulty, EvaluationResult, HistoryEntry, InterviewConfig, QuestionAnswerPair, Role,
};
