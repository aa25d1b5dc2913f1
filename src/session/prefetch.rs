//! Background follow-up generation.
//!
//! [`PrefetchScheduler::begin`] spawns one tokio task that asks the pipeline
//! for a follow-up question and returns a [`PrefetchHandle`] to it.  The task
//! only writes into the handle's oneshot channel, never into session state.
//!
//! ```text
//! begin ──▶ Pending ──task finishes──▶ Ready(qa) ──take_value──▶ Consumed
//!              │                  └──▶ Failed(err)
//!              └──cancel──▶ Cancelled   (result discarded even if it arrives)
//! ```
//!
//! The scheduler hands out at most one live handle at a time.  A handle stops
//! being live when it is cancelled, consumed or dropped.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::task::JoinHandle;

use super::error::{PrefetchError, SessionError};
use super::types::{InterviewConfig, QuestionAnswerPair};
use crate::llm::{PipelineClient, PipelineError};

type PrefetchResult = Result<QuestionAnswerPair, PipelineError>;

// ---------------------------------------------------------------------------
// PrefetchState
// ---------------------------------------------------------------------------

/// Observable state of a [`PrefetchHandle`].
#[derive(Debug, Clone)]
pub enum PrefetchState {
    /// The follow-up call is still running.
    Pending,
    /// The follow-up is available and has not been taken yet.
    Ready(QuestionAnswerPair),
    /// The background call failed.
    Failed(PrefetchError),
    /// The handle was cancelled; any late result is discarded.
    Cancelled,
    /// The value was taken; it is never handed out again.
    Consumed,
}

impl PrefetchState {
    pub fn is_pending(&self) -> bool {
        matches!(self, PrefetchState::Pending)
    }
}

// ---------------------------------------------------------------------------
// Lease
// ---------------------------------------------------------------------------

/// Marks the scheduler's single slot as taken until dropped.
struct Lease(Arc<AtomicBool>);

impl Drop for Lease {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// PrefetchHandle
// ---------------------------------------------------------------------------

/// Single-use, cancellable reference to one background follow-up call.
///
/// Dropping the handle aborts the task if it is still running.
pub struct PrefetchHandle {
    id: u64,
    state: PrefetchState,
    rx: Option<oneshot::Receiver<PrefetchResult>>,
    task: JoinHandle<()>,
    lease: Option<Lease>,
}

impl fmt::Debug for PrefetchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrefetchHandle")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl PrefetchHandle {
    /// Sequence number of this handle within its scheduler.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Last observed state, without polling the task.
    pub fn state(&self) -> &PrefetchState {
        &self.state
    }

    /// `true` while the handle still occupies the scheduler's slot.
    pub fn is_live(&self) -> bool {
        self.lease.is_some()
    }

    /// Poll the task without blocking and return the refreshed state.
    pub fn poll(&mut self) -> &PrefetchState {
        if let Some(rx) = self.rx.as_mut() {
            match rx.try_recv() {
                Ok(result) => self.settle(Some(result)),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Closed) => self.settle(None),
            }
        }
        &self.state
    }

    /// Wait at most `timeout` for the task to finish.
    ///
    /// A zero timeout still observes a task that has already finished.  On
    /// expiry the state stays [`PrefetchState::Pending`].
    pub async fn wait(&mut self, timeout: Duration) -> &PrefetchState {
        if let Some(rx) = self.rx.as_mut() {
            match tokio::time::timeout(timeout, rx).await {
                Ok(Ok(result)) => self.settle(Some(result)),
                Ok(Err(_)) => self.settle(None),
                Err(_elapsed) => {
                    log::debug!("prefetch #{}: still pending after {timeout:?}", self.id);
                }
            }
        }
        &self.state
    }

    /// Take the ready value.  Returns `Some` at most once per handle.
    pub fn take_value(&mut self) -> Option<QuestionAnswerPair> {
        self.poll();
        if !matches!(self.state, PrefetchState::Ready(_)) {
            return None;
        }
        self.lease = None;
        match std::mem::replace(&mut self.state, PrefetchState::Consumed) {
            PrefetchState::Ready(qa) => Some(qa),
            _ => None,
        }
    }

    /// Wait at most `timeout`, then either take the value or explain why
    /// it cannot be used.  A still-pending task is cancelled.
    pub async fn resolve(mut self, timeout: Duration) -> Result<QuestionAnswerPair, PrefetchError> {
        self.wait(timeout).await;
        if let Some(qa) = self.take_value() {
            return Ok(qa);
        }
        let err = match &self.state {
            PrefetchState::Pending => PrefetchError::TimedOut(timeout),
            PrefetchState::Failed(e) => e.clone(),
            PrefetchState::Ready(_) | PrefetchState::Cancelled | PrefetchState::Consumed => {
                PrefetchError::Cancelled
            }
        };
        self.cancel();
        Err(err)
    }

    /// Request cancellation.
    ///
    /// The task is aborted at its next suspension point; whether or not the
    /// underlying call still completes, its result is never surfaced.
    /// Already failed or consumed handles keep their state.
    pub fn cancel(&mut self) {
        self.task.abort();
        self.rx = None;
        self.lease = None;
        if matches!(self.state, PrefetchState::Pending | PrefetchState::Ready(_)) {
            log::debug!("prefetch #{}: cancelled", self.id);
            self.state = PrefetchState::Cancelled;
        }
    }

    fn settle(&mut self, result: Option<PrefetchResult>) {
        self.rx = None;
        self.state = match result {
            Some(Ok(qa)) => PrefetchState::Ready(qa),
            Some(Err(e)) => {
                self.lease = None;
                PrefetchState::Failed(PrefetchError::Failed(e))
            }
            None => {
                self.lease = None;
                PrefetchState::Failed(PrefetchError::Lost)
            }
        };
    }
}

impl Drop for PrefetchHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// ---------------------------------------------------------------------------
// PrefetchScheduler
// ---------------------------------------------------------------------------

/// Launches background follow-up generation, one handle at a time.
pub struct PrefetchScheduler {
    pipeline: Arc<dyn PipelineClient>,
    outstanding: Arc<AtomicBool>,
    next_id: AtomicU64,
}

impl PrefetchScheduler {
    pub fn new(pipeline: Arc<dyn PipelineClient>) -> Self {
        Self {
            pipeline,
            outstanding: Arc::new(AtomicBool::new(false)),
            next_id: AtomicU64::new(1),
        }
    }

    /// `true` while a handle from this scheduler is live.
    pub fn has_outstanding(&self) -> bool {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Start generating a follow-up to `question` in the background.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// [`SessionError::PrefetchOutstanding`] when a previous handle is still
    /// live.
    pub fn begin(
        &self,
        question: &str,
        config: &InterviewConfig,
    ) -> Result<PrefetchHandle, SessionError> {
        if self
            .outstanding
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SessionError::PrefetchOutstanding);
        }
        let lease = Lease(Arc::clone(&self.outstanding));
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let (tx, rx) = oneshot::channel();
        let pipeline = Arc::clone(&self.pipeline);
        let question = question.to_string();
        let config = config.clone();

        log::debug!("prefetch #{id}: started");
        let task = tokio::spawn(async move {
            let result = pipeline
                .follow_up(
                    &question,
                    &config.company_name,
                    &config.role,
                    config.difficulty,
                )
                .await;
            if let Err(e) = &result {
                log::warn!("prefetch #{id}: follow-up failed: {e}");
            }
            if tx.send(result).is_err() {
                log::debug!("prefetch #{id}: result discarded, handle gone");
            }
        });

        Ok(PrefetchHandle {
            id,
            state: PrefetchState::Pending,
            rx: Some(rx),
            task,
            lease: Some(lease),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ScriptedPipeline, ScriptedReply};
    use crate::session::Difficulty;
    use tokio::sync::Notify;

    fn config() -> InterviewConfig {
        InterviewConfig::new("Google", "Data Scientist", Difficulty::Medium)
    }

    fn qa(n: u32) -> QuestionAnswerPair {
        QuestionAnswerPair::new(format!("Q{n}"), format!("A{n}"))
    }

    fn scheduler(pipeline: ScriptedPipeline) -> (PrefetchScheduler, Arc<ScriptedPipeline>) {
        let pipeline = Arc::new(pipeline);
        (PrefetchScheduler::new(pipeline.clone()), pipeline)
    }

    const WAIT: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn ready_value_is_taken_once() {
        let (sched, pipeline) =
            scheduler(ScriptedPipeline::new().follow_up(ScriptedReply::Ready(qa(2))));
        let mut handle = sched.begin("Q1", &config()).unwrap();

        assert!(matches!(handle.wait(WAIT).await, PrefetchState::Ready(q) if *q == qa(2)));
        assert_eq!(handle.take_value(), Some(qa(2)));
        assert_eq!(handle.take_value(), None);
        assert!(matches!(handle.state(), PrefetchState::Consumed));
        assert_eq!(pipeline.follow_up_questions(), ["Q1"]);
    }

    #[tokio::test]
    async fn second_begin_while_outstanding_is_a_state_error() {
        let (sched, _) = scheduler(ScriptedPipeline::new());
        let _first = sched.begin("Q1", &config()).unwrap();

        let err = sched.begin("Q1", &config()).unwrap_err();
        assert!(matches!(err, SessionError::PrefetchOutstanding));
        assert!(err.is_state_error());
    }

    #[tokio::test]
    async fn dropping_or_cancelling_frees_the_slot() {
        let (sched, _) = scheduler(ScriptedPipeline::new());

        let first = sched.begin("Q1", &config()).unwrap();
        assert!(sched.has_outstanding());
        drop(first);
        assert!(!sched.has_outstanding());

        let mut second = sched.begin("Q1", &config()).unwrap();
        second.cancel();
        assert!(!sched.has_outstanding());
        assert!(!second.is_live());
        assert!(sched.begin("Q1", &config()).is_ok());
    }

    #[tokio::test]
    async fn consuming_frees_the_slot() {
        let (sched, _) = scheduler(ScriptedPipeline::new().follow_up(ScriptedReply::Ready(qa(2))));
        let mut handle = sched.begin("Q1", &config()).unwrap();
        handle.wait(WAIT).await;
        assert!(sched.has_outstanding(), "ready but unconsumed is still live");

        handle.take_value();
        assert!(!sched.has_outstanding());
    }

    #[tokio::test]
    async fn wait_times_out_while_pending() {
        let (sched, _) = scheduler(ScriptedPipeline::new().follow_up(ScriptedReply::Never));
        let mut handle = sched.begin("Q1", &config()).unwrap();

        assert!(handle.wait(Duration::from_millis(20)).await.is_pending());
        assert_eq!(handle.take_value(), None);
    }

    #[tokio::test]
    async fn failed_call_reports_failed() {
        let (sched, _) = scheduler(
            ScriptedPipeline::new().follow_up(ScriptedReply::Fail(PipelineError::Timeout)),
        );
        let mut handle = sched.begin("Q1", &config()).unwrap();

        let state = handle.wait(WAIT).await;
        assert!(matches!(
            state,
            PrefetchState::Failed(PrefetchError::Failed(PipelineError::Timeout))
        ));
        assert!(!sched.has_outstanding());
    }

    #[tokio::test]
    async fn cancelled_handle_ignores_late_result() {
        let gate = Arc::new(Notify::new());
        let (sched, _) = scheduler(
            ScriptedPipeline::new().follow_up(ScriptedReply::Gated(gate.clone(), qa(2))),
        );
        let mut handle = sched.begin("Q1", &config()).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        handle.cancel();
        gate.notify_one();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(matches!(handle.poll(), PrefetchState::Cancelled));
        assert!(matches!(handle.wait(WAIT).await, PrefetchState::Cancelled));
        assert_eq!(handle.take_value(), None);
    }

    #[tokio::test]
    async fn resolve_reports_timeout_and_cancels() {
        let (sched, _) = scheduler(ScriptedPipeline::new().follow_up(ScriptedReply::Never));
        let handle = sched.begin("Q1", &config()).unwrap();

        let err = handle.resolve(Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, PrefetchError::TimedOut(_)));
        assert!(!sched.has_outstanding());
    }

    #[tokio::test]
    async fn resolve_with_zero_wait_sees_finished_task() {
        let (sched, _) = scheduler(ScriptedPipeline::new().follow_up(ScriptedReply::Ready(qa(2))));
        let handle = sched.begin("Q1", &config()).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(handle.resolve(Duration::ZERO).await.unwrap(), qa(2));
    }
}
