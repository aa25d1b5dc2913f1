//! Session state machine: drives question → answer → evaluation → next
//! question.
//!
//! [`SessionStateMachine`] owns the [`InterviewSession`] and is the only
//! thing that mutates it.  Front ends call [`start`], [`submit_answer`],
//! [`retry`] and [`stop`] and read the transcript through accessors.
//!
//! # Flow
//!
//! ```text
//! start(config)
//!   └─▶ pipeline.prepare_question                 [GeneratingQuestion]
//!         └─▶ history += Q1, prefetch.begin(Q1)    [AwaitingAnswer]
//!
//! submit_answer(text)
//!   └─▶ pipeline.evaluate(current question)       [Evaluating]
//!         └─▶ history += feedback                  [ResolvingNext]
//!               ├─ prefetch ready within wait → take it
//!               └─ pending / failed → pipeline.follow_up (sync fallback)
//!                     └─▶ history += Qn, prefetch.begin(Qn)
//!                                                  [AwaitingFollowUpAnswer]
//! ```
//!
//! Every operation takes `&mut self`, so operations never interleave.  The
//! only concurrent work is the single background prefetch, which reports
//! through its handle and never writes into the session.
//!
//! If an operation's future is dropped before it completes, the session is
//! left in the busy phase it had reached and only [`stop`] is accepted.
//!
//! [`start`]: SessionStateMachine::start
//! [`submit_answer`]: SessionStateMachine::submit_answer
//! [`retry`]: SessionStateMachine::retry
//! [`stop`]: SessionStateMachine::stop

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use super::error::SessionError;
use super::prefetch::{PrefetchScheduler, PrefetchState};
use super::state::{InterviewSession, Phase, Recovery};
use super::types::{EvaluationResult, HistoryEntry, InterviewConfig, QuestionAnswerPair};
use crate::llm::{PipelineClient, PipelineError};

// ---------------------------------------------------------------------------
// SessionSettings
// ---------------------------------------------------------------------------

/// Tuning knobs for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Upper bound on how long the next-question step waits for a pending
    /// prefetch before falling back to a synchronous follow-up call.
    ///
    /// `Duration::ZERO` gives the fully sequential behaviour: a prefetch is
    /// only used if it has already finished.
    pub prefetch_wait: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            prefetch_wait: Duration::from_secs(30),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionStateMachine
// ---------------------------------------------------------------------------

/// Drives one interview session.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use mock_interview::config::AppConfig;
/// use mock_interview::llm::ApiPipeline;
/// use mock_interview::session::{
///     Difficulty, InterviewConfig, SessionSettings, SessionStateMachine,
/// };
///
/// # async fn example() -> Result<(), mock_interview::session::SessionError> {
/// let config = AppConfig::default();
/// let pipeline = Arc::new(ApiPipeline::from_config(&config.llm));
/// let mut session = SessionStateMachine::new(pipeline, SessionSettings::default());
///
/// session
///     .start(InterviewConfig::new("Google", "Data Scientist", Difficulty::Medium))
///     .await?;
/// println!("{}", session.current_qa().unwrap().question);
///
/// session.submit_answer("A p-value is ...").await?;
/// session.stop();
/// # Ok(())
/// # }
/// ```
pub struct SessionStateMachine {
    pipeline: Arc<dyn PipelineClient>,
    scheduler: PrefetchScheduler,
    settings: SessionSettings,
    session: InterviewSession,
    phase_tx: watch::Sender<Phase>,
}

impl SessionStateMachine {
    /// Create a session in [`Phase::Init`].
    ///
    /// `pipeline` is shared with the background prefetch task.
    pub fn new(pipeline: Arc<dyn PipelineClient>, settings: SessionSettings) -> Self {
        let (phase_tx, _) = watch::channel(Phase::Init);
        Self {
            scheduler: PrefetchScheduler::new(Arc::clone(&pipeline)),
            pipeline,
            settings,
            session: InterviewSession::default(),
            phase_tx,
        }
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    pub fn phase(&self) -> Phase {
        self.session.phase
    }

    /// The question the candidate is expected to answer, if any.
    pub fn current_qa(&self) -> Option<&QuestionAnswerPair> {
        self.session.current_qa.as_ref()
    }

    /// Questions and evaluation feedback, oldest first.
    pub fn history(&self) -> &[HistoryEntry] {
        &self.session.history
    }

    pub fn config(&self) -> Option<&InterviewConfig> {
        self.session.config.as_ref()
    }

    /// The most recent evaluation, including its verdict.
    pub fn last_evaluation(&self) -> Option<&EvaluationResult> {
        self.session.last_evaluation.as_ref()
    }

    /// Last observed state of the prefetch slot.
    pub fn prefetch_state(&self) -> Option<&PrefetchState> {
        self.session.prefetch.as_ref().map(|h| h.state())
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    /// Subscribe to phase changes, e.g. to show a spinner while busy.
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase_tx.subscribe()
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Generate the opening question.  Valid only from [`Phase::Init`].
    ///
    /// On success the session awaits an answer and a follow-up is already
    /// being generated in the background.
    pub async fn start(&mut self, config: InterviewConfig) -> Result<(), SessionError> {
        self.ensure("start", |p| p == Phase::Init)?;
        log::info!(
            "session: starting interview for {} at {} ({})",
            config.role,
            config.company_name,
            config.difficulty
        );
        self.open(config).await
    }

    /// Evaluate `text` against the current question, then move on to the
    /// next question.  Valid only while an answer is awaited.
    ///
    /// The evaluation always uses the question that was current when this
    /// call was made.
    pub async fn submit_answer(&mut self, text: &str) -> Result<(), SessionError> {
        self.ensure("submit_answer", |p| p.accepts_answer())?;
        let Some(qa) = self.session.current_qa.take() else {
            return Err(self.phase_error("submit_answer"));
        };
        self.evaluate(qa, text.to_string()).await
    }

    /// Re-run the step that failed.  Valid only from [`Phase::Error`].
    pub async fn retry(&mut self) -> Result<(), SessionError> {
        self.ensure("retry", |p| p == Phase::Error)?;
        let Some(recovery) = self.session.recovery.take() else {
            return Err(self.phase_error("retry"));
        };
        log::info!("session: retrying {}", recovery.label());

        match recovery {
            Recovery::Start(config) => self.open(config).await,
            Recovery::Evaluate { qa, answer } => self.evaluate(qa, answer).await,
            Recovery::Resolve { answered } => self.resolve_next(answered).await,
        }
    }

    /// Cancel any live prefetch and terminate the session.  Idempotent.
    pub fn stop(&mut self) {
        if self.session.phase.is_terminal() {
            log::debug!("session: stop called on a terminated session");
            return;
        }
        if let Some(handle) = self.session.prefetch.as_mut() {
            handle.cancel();
        }
        self.session.current_qa = None;
        self.session.recovery = None;
        self.set_phase(Phase::Terminated);
        log::info!(
            "session: stopped after {} transcript entries",
            self.session.history.len()
        );
    }

    // -----------------------------------------------------------------------
    // Steps
    // -----------------------------------------------------------------------

    async fn open(&mut self, config: InterviewConfig) -> Result<(), SessionError> {
        self.set_phase(Phase::GeneratingQuestion);

        let result = self
            .pipeline
            .prepare_question(&config.company_name, &config.role, config.difficulty)
            .await;

        match result {
            Ok(qa) => {
                self.session.config = Some(config);
                self.present(qa, Phase::AwaitingAnswer);
                Ok(())
            }
            Err(e) => Err(self.fail(Recovery::Start(config), e)),
        }
    }

    async fn evaluate(
        &mut self,
        qa: QuestionAnswerPair,
        answer: String,
    ) -> Result<(), SessionError> {
        self.set_phase(Phase::Evaluating);
        log::debug!("session: evaluating answer ({} chars)", answer.len());

        let result = self
            .pipeline
            .evaluate(&qa.question, &answer, &qa.correct_answer)
            .await;

        match result {
            Ok(evaluation) => {
                log::info!("session: verdict {:?}", evaluation.verdict);
                self.session
                    .history
                    .push(HistoryEntry::assistant(&evaluation.feedback));
                self.session.last_evaluation = Some(evaluation);
                self.resolve_next(qa).await
            }
            Err(e) => Err(self.fail(Recovery::Evaluate { qa, answer }, e)),
        }
    }

    /// Pick the next question: the prefetch if it is usable within the
    /// wait bound, otherwise a synchronous follow-up to `answered`.
    async fn resolve_next(&mut self, answered: QuestionAnswerPair) -> Result<(), SessionError> {
        self.set_phase(Phase::ResolvingNext);

        let Some(config) = self.session.config.clone() else {
            return Err(self.phase_error("resolve_next"));
        };

        let prefetched = match self.session.prefetch.take() {
            Some(handle) => {
                let id = handle.id();
                match handle.resolve(self.settings.prefetch_wait).await {
                    Ok(qa) => {
                        log::debug!("session: using prefetched follow-up #{id}");
                        Some(qa)
                    }
                    Err(e) => {
                        log::warn!(
                            "session: prefetch #{id} unusable ({e}), generating synchronously"
                        );
                        None
                    }
                }
            }
            None => None,
        };

        let next = match prefetched {
            Some(qa) => qa,
            None => {
                let result = self
                    .pipeline
                    .follow_up(
                        &answered.question,
                        &config.company_name,
                        &config.role,
                        config.difficulty,
                    )
                    .await;
                match result {
                    Ok(qa) => qa,
                    Err(e) => return Err(self.fail(Recovery::Resolve { answered }, e)),
                }
            }
        };

        self.present(next, Phase::AwaitingFollowUpAnswer);
        Ok(())
    }

    /// Make `qa` current, record it, and start prefetching its follow-up.
    fn present(&mut self, qa: QuestionAnswerPair, phase: Phase) {
        // The slot must be empty before a new prefetch can begin.
        self.session.prefetch = None;

        let handle = match &self.session.config {
            Some(config) => match self.scheduler.begin(&qa.question, config) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    log::warn!("session: follow-up prefetch not started: {e}");
                    None
                }
            },
            None => None,
        };

        self.session.history.push(HistoryEntry::assistant(&qa.question));
        self.session.prefetch = handle;
        self.session.current_qa = Some(qa);
        self.set_phase(phase);
    }

    fn fail(&mut self, recovery: Recovery, error: PipelineError) -> SessionError {
        log::error!("session: {} failed: {error}", recovery.label());
        self.session.recovery = Some(recovery);
        self.set_phase(Phase::Error);
        SessionError::Pipeline(error)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn ensure(
        &self,
        operation: &'static str,
        allowed: impl Fn(Phase) -> bool,
    ) -> Result<(), SessionError> {
        if allowed(self.session.phase) {
            Ok(())
        } else {
            Err(self.phase_error(operation))
        }
    }

    fn phase_error(&self, operation: &'static str) -> SessionError {
        log::error!(
            "session: {operation} rejected in phase {}",
            self.session.phase
        );
        SessionError::InvalidPhase {
            operation,
            phase: self.session.phase,
        }
    }

    fn set_phase(&mut self, phase: Phase) {
        log::debug!("session: {} → {}", self.session.phase, phase);
        self.session.phase = phase;
        self.phase_tx.send_replace(phase);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
