//! Errors surfaced by the session engine.

use std::time::Duration;

use thiserror::Error;

use super::state::Phase;
use crate::llm::PipelineError;

/// Errors returned by [`SessionStateMachine`](super::SessionStateMachine)
/// and [`PrefetchScheduler`](super::PrefetchScheduler).
#[derive(Debug, Error)]
pub enum SessionError {
    /// An operation was invoked in a phase that does not permit it.  The
    /// session is left untouched.
    #[error("{operation} is not allowed while the session is {phase}")]
    InvalidPhase {
        operation: &'static str,
        phase: Phase,
    },

    /// `begin` was called while another prefetch handle is still live.
    #[error("a follow-up prefetch is already outstanding for this session")]
    PrefetchOutstanding,

    /// A required generation or evaluation call failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl SessionError {
    /// `true` for integration bugs (operation called at the wrong time), as
    /// opposed to service failures.
    pub fn is_state_error(&self) -> bool {
        matches!(
            self,
            SessionError::InvalidPhase { .. } | SessionError::PrefetchOutstanding
        )
    }
}

/// Why a prefetched follow-up could not be used.
///
/// Never leaves the session engine: it only selects the synchronous
/// fallback path.
#[derive(Debug, Clone, Error)]
pub enum PrefetchError {
    #[error("background follow-up failed: {0}")]
    Failed(#[from] PipelineError),

    #[error("background follow-up not ready after {0:?}")]
    TimedOut(Duration),

    /// The background task ended without delivering a result.
    #[error("background follow-up task ended without a result")]
    Lost,

    #[error("background follow-up was cancelled")]
    Cancelled,
}
