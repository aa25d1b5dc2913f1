//! Session phases and the state owned by the session engine.
//!
//! [`Phase`] drives the [`SessionStateMachine`](super::SessionStateMachine).
//! Front ends read it (directly or through a `watch` subscription) to decide
//! what to render and which operation is legal next.
//!
//! [`InterviewSession`] is the data the state machine owns exclusively:
//! config, current question, transcript and the prefetch slot.

use std::fmt;

use super::prefetch::PrefetchHandle;
use super::types::{EvaluationResult, HistoryEntry, InterviewConfig, QuestionAnswerPair};

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// States of an interview session.
///
/// ```text
/// Init ──start──▶ GeneratingQuestion ──▶ AwaitingAnswer
///                                        │
///         ┌──────────── submit_answer ◀──┘
///         ▼
///     Evaluating ──▶ ResolvingNext ──▶ AwaitingFollowUpAnswer ──submit_answer──┐
///         ▲                                                                   │
///         └───────────────────────────────────────────────────────────────────┘
/// any working state ──pipeline failure──▶ Error ──retry──▶ (failed step)
/// any non-terminal state ──stop──▶ Terminated
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Created, `start` not called yet.
    #[default]
    Init,
    /// The opening question is being generated.
    GeneratingQuestion,
    /// The opening question is shown; waiting for the candidate.
    AwaitingAnswer,
    /// A follow-up question is shown; waiting for the candidate.
    ///
    /// Behaves exactly like `AwaitingAnswer`; the label only differs for
    /// display.
    AwaitingFollowUpAnswer,
    /// The submitted answer is being evaluated.
    Evaluating,
    /// The next question is being taken from the prefetch or generated.
    ResolvingNext,
    /// The session was stopped.
    Terminated,
    /// A required pipeline call failed; `retry` or `stop` are accepted.
    Error,
}

impl Phase {
    /// `true` when `submit_answer` is accepted, which is exactly when a
    /// current question exists.
    pub fn accepts_answer(&self) -> bool {
        matches!(self, Phase::AwaitingAnswer | Phase::AwaitingFollowUpAnswer)
    }

    /// `true` while a pipeline call is in flight.
    ///
    /// ```
    /// use mock_interview::session::Phase;
    ///
    /// assert!(Phase::Evaluating.is_busy());
    /// assert!(!Phase::AwaitingAnswer.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Phase::GeneratingQuestion | Phase::Evaluating | Phase::ResolvingNext
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Terminated)
    }

    /// A short human-readable label suitable for a status line.
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Init => "not started",
            Phase::GeneratingQuestion => "preparing question",
            Phase::AwaitingAnswer => "awaiting answer",
            Phase::AwaitingFollowUpAnswer => "awaiting follow-up answer",
            Phase::Evaluating => "evaluating answer",
            Phase::ResolvingNext => "preparing next question",
            Phase::Terminated => "terminated",
            Phase::Error => "error",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Recovery
// ---------------------------------------------------------------------------

/// The step to re-run when the session sits in [`Phase::Error`].
#[derive(Debug, Clone)]
pub(crate) enum Recovery {
    /// Opening question generation failed.
    Start(InterviewConfig),
    /// Evaluation of `answer` for `qa` failed.
    Evaluate {
        qa: QuestionAnswerPair,
        answer: String,
    },
    /// Both the prefetch and the synchronous follow-up for `answered` failed.
    Resolve { answered: QuestionAnswerPair },
}

impl Recovery {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            Recovery::Start(_) => "question preparation",
            Recovery::Evaluate { .. } => "answer evaluation",
            Recovery::Resolve { .. } => "follow-up generation",
        }
    }
}

// ---------------------------------------------------------------------------
// InterviewSession
// ---------------------------------------------------------------------------

/// State of one interview, owned and mutated only by the state machine.
///
/// Invariants upheld by every transition:
/// * `current_qa.is_some() == phase.accepts_answer()`
/// * `history` only grows
/// * `prefetch` holds at most one handle
#[derive(Debug, Default)]
pub struct InterviewSession {
    pub(crate) config: Option<InterviewConfig>,
    pub(crate) phase: Phase,
    pub(crate) current_qa: Option<QuestionAnswerPair>,
    pub(crate) history: Vec<HistoryEntry>,
    pub(crate) prefetch: Option<PrefetchHandle>,
    pub(crate) last_evaluation: Option<EvaluationResult>,
    pub(crate) recovery: Option<Recovery>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_answer_phases_accept_answers() {
        let all = [
            Phase::Init,
            Phase::GeneratingQuestion,
            Phase::AwaitingAnswer,
            Phase::AwaitingFollowUpAnswer,
            Phase::Evaluating,
            Phase::ResolvingNext,
            Phase::Terminated,
            Phase::Error,
        ];
        let accepting: Vec<_> = all.iter().filter(|p| p.accepts_answer()).collect();
        assert_eq!(
            accepting,
            [&Phase::AwaitingAnswer, &Phase::AwaitingFollowUpAnswer]
        );
    }

    #[test]
    fn busy_phases() {
        assert!(Phase::GeneratingQuestion.is_busy());
        assert!(Phase::ResolvingNext.is_busy());
        assert!(!Phase::Error.is_busy());
        assert!(!Phase::Init.is_busy());
    }

    #[test]
    fn display_uses_label() {
        assert_eq!(Phase::AwaitingFollowUpAnswer.to_string(), "awaiting follow-up answer");
        assert_eq!(Phase::default(), Phase::Init);
    }

    #[test]
    fn new_session_is_empty() {
        let session = InterviewSession::default();
        assert_eq!(session.phase, Phase::Init);
        assert!(session.current_qa.is_none());
        assert!(session.history.is_empty());
        assert!(session.prefetch.is_none());
    }
}
