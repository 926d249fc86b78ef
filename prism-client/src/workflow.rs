//! Drives a diary entry from raw text to a rendered result.
//!
//! One submission walks `Analyzing -> Generating -> Fetching -> Complete`,
//! strictly in that order. The calendar and the detail view are only touched
//! once the full detail is in hand, so neither ever sees a half-built entry.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use time::Date;
use tokio::sync::watch;

use crate::backend::DiaryBackend;
use crate::calendar::{lock, PendingGuard, SharedCalendar};
use crate::domain::{AnalysisResult, DiaryEntryDetail, LogId};
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum WorkflowState {
    #[default]
    Idle,
    Analyzing,
    Generating {
        log_id: LogId,
        keywords: Vec<String>,
    },
    Fetching {
        log_id: LogId,
    },
    Complete {
        detail: DiaryEntryDetail,
    },
}

impl WorkflowState {
    /// Whether a new submission may start from this state.
    pub fn is_ready(&self) -> bool {
        matches!(self, WorkflowState::Idle | WorkflowState::Complete { .. })
    }

    pub fn is_busy(&self) -> bool {
        !self.is_ready()
    }

    fn name(&self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::Analyzing => "analyzing",
            WorkflowState::Generating { .. } => "generating",
            WorkflowState::Fetching { .. } => "fetching",
            WorkflowState::Complete { .. } => "complete",
        }
    }
}

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Diary content is empty")]
    Validation,
    #[error("Another submission is still in progress")]
    Busy,
    #[error("Another action is already running for entry {0}")]
    Pending(LogId),
    #[error("Analysis failed: {0}")]
    Analysis(#[source] ApiError),
    #[error("Image generation failed: {0}")]
    Generation(#[source] ApiError),
    #[error("Entry {log_id} was saved but could not be fetched: {source}")]
    Fetch {
        log_id: LogId,
        #[source]
        source: ApiError,
    },
    #[error("Delete failed: {0}")]
    Delete(#[source] ApiError),
    #[error("Workflow was closed before the backend answered")]
    Abandoned,
}

impl WorkflowError {
    /// The backend error behind a failed step, if any.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            WorkflowError::Analysis(e)
            | WorkflowError::Generation(e)
            | WorkflowError::Delete(e)
            | WorkflowError::Fetch { source: e, .. } => Some(e),
            _ => None,
        }
    }
}

/// Cloneable handle telling in-flight steps whether their view is still open.
#[derive(Debug, Clone, Default)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    pub fn close(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a completed entry lands in the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Completion {
    /// New entry: add it.
    Insert,
    /// Regenerated entry: overwrite the listed summary, never add one.
    Replace,
}

pub struct DiaryWorkflow<B> {
    backend: Arc<B>,
    calendar: SharedCalendar,
    state: watch::Sender<WorkflowState>,
    liveness: Liveness,
}

impl<B: DiaryBackend> DiaryWorkflow<B> {
    pub fn new(backend: Arc<B>, calendar: SharedCalendar) -> Self {
        let (state, _) = watch::channel(WorkflowState::Idle);
        Self {
            backend,
            calendar,
            state,
            liveness: Liveness::default(),
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state.borrow().clone()
    }

    /// Follow state transitions, e.g. to drive a loading screen.
    pub fn subscribe(&self) -> watch::Receiver<WorkflowState> {
        self.state.subscribe()
    }

    pub fn liveness(&self) -> Liveness {
        self.liveness.clone()
    }

    /// Dismiss the controller. Responses still in flight will be discarded.
    pub fn close(&self) {
        self.liveness.close();
    }

    pub fn calendar(&self) -> &SharedCalendar {
        &self.calendar
    }

    pub fn reset(&self) {
        if !self.liveness.is_closed() {
            self.transition(WorkflowState::Idle);
        }
    }

    /// Write a new entry: analyze, generate its image, fetch the result.
    pub async fn submit(
        &self,
        date: Date,
        content: &str,
    ) -> Result<DiaryEntryDetail, WorkflowError> {
        if content.trim().is_empty() {
            return Err(WorkflowError::Validation);
        }
        self.ensure_alive()?;
        self.begin(WorkflowState::Analyzing)?;

        let analysis = self
            .step(self.backend.analyze(date, content), WorkflowError::Analysis)
            .await?;
        self.generate_and_fetch(analysis, Completion::Insert).await
    }

    /// Re-run analysis and image generation for an existing entry.
    pub async fn regenerate(&self, id: LogId) -> Result<DiaryEntryDetail, WorkflowError> {
        self.ensure_alive()?;
        let _pending = PendingGuard::acquire(&self.calendar, id).ok_or(WorkflowError::Pending(id))?;
        self.begin(WorkflowState::Analyzing)?;

        let analysis = self
            .step(self.backend.regenerate(id), WorkflowError::Analysis)
            .await?;
        self.generate_and_fetch(analysis, Completion::Replace).await
    }

    /// Fetch an entry whose image was generated but whose detail never
    /// arrived (see [`WorkflowError::Fetch`]), and add it to the calendar.
    pub async fn retry_fetch(&self, log_id: LogId) -> Result<DiaryEntryDetail, WorkflowError> {
        self.ensure_alive()?;
        self.begin(WorkflowState::Fetching { log_id })?;
        self.fetch(log_id, Completion::Insert).await
    }

    pub async fn delete(&self, id: LogId) -> Result<(), WorkflowError> {
        self.ensure_alive()?;
        let _pending = PendingGuard::acquire(&self.calendar, id).ok_or(WorkflowError::Pending(id))?;

        let result = self.backend.delete(id).await;
        self.ensure_alive()?;
        result.map_err(WorkflowError::Delete)?;

        lock(&self.calendar).remove(id);
        self.state.send_if_modified(|state| {
            let showing = matches!(state, WorkflowState::Complete { detail } if detail.id == id);
            if showing {
                *state = WorkflowState::Idle;
            }
            showing
        });
        tracing::info!(log_id = id, "diary entry deleted");
        Ok(())
    }

    async fn generate_and_fetch(
        &self,
        analysis: AnalysisResult,
        completion: Completion,
    ) -> Result<DiaryEntryDetail, WorkflowError> {
        let AnalysisResult {
            log_id, keywords, ..
        } = analysis;

        self.transition(WorkflowState::Generating { log_id, keywords });
        let log_id = self
            .step(
                self.backend.generate_image(log_id),
                WorkflowError::Generation,
            )
            .await?;

        self.transition(WorkflowState::Fetching { log_id });
        self.fetch(log_id, completion).await
    }

    async fn fetch(
        &self,
        log_id: LogId,
        completion: Completion,
    ) -> Result<DiaryEntryDetail, WorkflowError> {
        let detail = self
            .step(self.backend.get_detail(log_id), |source| {
                WorkflowError::Fetch { log_id, source }
            })
            .await?;

        {
            let mut calendar = lock(&self.calendar);
            match completion {
                Completion::Insert => {
                    calendar.upsert(detail.summary());
                }
                Completion::Replace => {
                    if calendar.contains(detail.id) {
                        calendar.upsert(detail.summary());
                    }
                }
            }
            calendar.open_detail(detail.clone());
        }

        self.transition(WorkflowState::Complete {
            detail: detail.clone(),
        });
        Ok(detail)
    }

    /// Await one backend call. A closed controller discards the outcome; a
    /// failure sends the machine back to idle.
    async fn step<T>(
        &self,
        call: impl Future<Output = ApiResult<T>>,
        wrap: impl FnOnce(ApiError) -> WorkflowError,
    ) -> Result<T, WorkflowError> {
        let result = call.await;
        self.ensure_alive()?;

        result.map_err(|e| {
            let state = self.state.borrow().name();
            tracing::warn!(state, error = %e, "workflow step failed");
            self.transition(WorkflowState::Idle);
            wrap(e)
        })
    }

    fn ensure_alive(&self) -> Result<(), WorkflowError> {
        if self.liveness.is_closed() {
            tracing::warn!("discarding result for a closed workflow");
            return Err(WorkflowError::Abandoned);
        }
        Ok(())
    }

    /// Enter `next` only from a ready state, atomically.
    fn begin(&self, next: WorkflowState) -> Result<(), WorkflowError> {
        let name = next.name();
        let mut began = false;
        self.state.send_if_modified(|state| {
            if state.is_ready() {
                *state = next;
                began = true;
            }
            began
        });

        if began {
            tracing::info!(state = name, "workflow started");
            Ok(())
        } else {
            Err(WorkflowError::Busy)
        }
    }

    fn transition(&self, next: WorkflowState) {
        tracing::info!(state = next.name(), "workflow transition");
        self.state.send_replace(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{MockBackend, Step};
    use crate::calendar::Calendar;
    use crate::domain::DiaryEntrySummary;
    use time::macros::date;

    fn walk_analysis() -> AnalysisResult {
        AnalysisResult {
            log_id: 42,
            keywords: vec!["walk".into(), "sunny".into()],
            representative_mood: Some("joy".into()),
        }
    }

    fn walk_detail() -> DiaryEntryDetail {
        DiaryEntryDetail {
            id: 42,
            date: date!(2024 - 03 - 05),
            keywords: vec!["walk".into(), "sunny".into()],
            image_url: Some("http://img/42.png".into()),
            content: "Had a great walk".into(),
            mood_score: Some(75),
        }
    }

    fn walk_summary() -> DiaryEntrySummary {
        DiaryEntrySummary {
            id: 42,
            date: date!(2024 - 03 - 05),
            image_url: Some("http://img/42.png".into()),
            mood_score: Some(75),
        }
    }

    fn other_summary() -> DiaryEntrySummary {
        DiaryEntrySummary {
            id: 7,
            date: date!(2024 - 03 - 01),
            image_url: None,
            mood_score: Some(20),
        }
    }

    fn workflow(backend: MockBackend) -> (DiaryWorkflow<MockBackend>, Arc<MockBackend>) {
        let backend = Arc::new(backend);
        (
            DiaryWorkflow::new(backend.clone(), Calendar::shared()),
            backend,
        )
    }

    fn ready_backend() -> MockBackend {
        MockBackend::new()
            .with_analysis(walk_analysis())
            .with_detail(walk_detail())
    }

    #[tokio::test]
    async fn submit_adds_entry_and_shows_detail() {
        let (workflow, backend) = workflow(ready_backend());

        let detail = workflow
            .submit(date!(2024 - 03 - 05), "Had a great walk")
            .await
            .unwrap();

        assert_eq!(detail, walk_detail());
        assert_eq!(
            backend.calls(),
            vec![Step::Analyze, Step::GenerateImage, Step::GetDetail]
        );

        let calendar = lock(workflow.calendar());
        assert_eq!(calendar.get(42), Some(&walk_summary()));
        assert_eq!(calendar.detail(), Some(&walk_detail()));
        drop(calendar);

        assert_eq!(
            workflow.state(),
            WorkflowState::Complete {
                detail: walk_detail()
            }
        );
    }

    #[tokio::test]
    async fn each_step_runs_in_its_own_state() {
        let (workflow, backend) = workflow(ready_backend());
        backend.observe(workflow.subscribe());

        workflow
            .submit(date!(2024 - 03 - 05), "Had a great walk")
            .await
            .unwrap();

        assert_eq!(
            backend.observed(),
            vec![
                WorkflowState::Analyzing,
                WorkflowState::Generating {
                    log_id: 42,
                    keywords: vec!["walk".into(), "sunny".into()],
                },
                WorkflowState::Fetching { log_id: 42 },
            ]
        );
    }

    #[tokio::test]
    async fn blank_content_never_reaches_the_backend() {
        let (workflow, backend) = workflow(ready_backend());

        for content in ["", "   ", "\n\t"] {
            assert!(matches!(
                workflow.submit(date!(2024 - 03 - 05), content).await,
                Err(WorkflowError::Validation)
            ));
        }

        assert!(backend.calls().is_empty());
        assert_eq!(workflow.state(), WorkflowState::Idle);
    }

    #[tokio::test]
    async fn analysis_failure_adds_nothing() {
        let (workflow, backend) = workflow(ready_backend().failing(Step::Analyze));

        let err = workflow
            .submit(date!(2024 - 03 - 05), "Had a great walk")
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::Analysis(_)));
        assert_eq!(backend.calls(), vec![Step::Analyze]);
        assert!(lock(workflow.calendar()).is_empty());
        assert_eq!(workflow.state(), WorkflowState::Idle);
    }

    #[tokio::test]
    async fn generation_failure_discards_analysis() {
        let (workflow, backend) = workflow(ready_backend().failing(Step::GenerateImage));

        let err = workflow
            .submit(date!(2024 - 03 - 05), "Had a great walk")
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::Generation(_)));
        assert_eq!(backend.calls(), vec![Step::Analyze, Step::GenerateImage]);
        assert!(lock(workflow.calendar()).is_empty());
        assert_eq!(workflow.state(), WorkflowState::Idle);
    }

    #[tokio::test]
    async fn fetch_failure_reports_the_orphaned_entry() {
        let (workflow, backend) = workflow(ready_backend().failing(Step::GetDetail));

        let err = workflow
            .submit(date!(2024 - 03 - 05), "Had a great walk")
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::Fetch { log_id: 42, .. }));
        assert!(lock(workflow.calendar()).is_empty());
        assert_eq!(workflow.state(), WorkflowState::Idle);

        backend.succeed(Step::GetDetail);
        let detail = workflow.retry_fetch(42).await.unwrap();

        assert_eq!(detail, walk_detail());
        assert_eq!(lock(workflow.calendar()).get(42), Some(&walk_summary()));
    }

    #[tokio::test]
    async fn submit_is_rejected_while_busy() {
        let (workflow, backend) = workflow(ready_backend());
        workflow.state.send_replace(WorkflowState::Fetching { log_id: 1 });

        assert!(matches!(
            workflow.submit(date!(2024 - 03 - 05), "again").await,
            Err(WorkflowError::Busy)
        ));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn completed_workflow_accepts_another_entry() {
        let (workflow, backend) = workflow(ready_backend());

        workflow
            .submit(date!(2024 - 03 - 05), "Had a great walk")
            .await
            .unwrap();
        workflow
            .submit(date!(2024 - 03 - 05), "Another walk")
            .await
            .unwrap();

        assert_eq!(backend.calls().len(), 6);
    }

    #[tokio::test]
    async fn closed_workflow_discards_late_results() {
        let (workflow, backend) = workflow(ready_backend());
        backend.close_on(Step::Analyze, workflow.liveness());

        let err = workflow
            .submit(date!(2024 - 03 - 05), "Had a great walk")
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::Abandoned));
        assert_eq!(backend.calls(), vec![Step::Analyze]);
        assert!(lock(workflow.calendar()).is_empty());
        assert!(lock(workflow.calendar()).detail().is_none());
    }

    #[tokio::test]
    async fn closing_during_generation_drops_the_image() {
        let (workflow, backend) = workflow(ready_backend());
        backend.close_on(Step::GenerateImage, workflow.liveness());

        let err = workflow
            .submit(date!(2024 - 03 - 05), "Had a great walk")
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::Abandoned));
        assert_eq!(backend.calls(), vec![Step::Analyze, Step::GenerateImage]);
        assert!(lock(workflow.calendar()).is_empty());
        assert!(!matches!(workflow.state(), WorkflowState::Fetching { .. }));
    }

    #[tokio::test]
    async fn closing_during_fetch_never_shows_the_detail() {
        let (workflow, backend) = workflow(ready_backend());
        backend.close_on(Step::GetDetail, workflow.liveness());

        let err = workflow
            .submit(date!(2024 - 03 - 05), "Had a great walk")
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::Abandoned));
        assert_eq!(
            backend.calls(),
            vec![Step::Analyze, Step::GenerateImage, Step::GetDetail]
        );
        let calendar = lock(workflow.calendar());
        assert!(calendar.is_empty());
        assert!(calendar.detail().is_none());
        drop(calendar);
        assert!(!matches!(workflow.state(), WorkflowState::Complete { .. }));
    }

    #[tokio::test]
    async fn close_refuses_new_work() {
        let (workflow, backend) = workflow(ready_backend());

        workflow.close();

        assert!(workflow.liveness().is_closed());
        assert!(matches!(
            workflow.submit(date!(2024 - 03 - 05), "Had a great walk").await,
            Err(WorkflowError::Abandoned)
        ));
        assert!(matches!(
            workflow.delete(42).await,
            Err(WorkflowError::Abandoned)
        ));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn reset_returns_to_idle_and_keeps_the_entry() {
        let (workflow, _backend) = workflow(ready_backend());
        workflow
            .submit(date!(2024 - 03 - 05), "Had a great walk")
            .await
            .unwrap();
        let mut states = workflow.subscribe();

        workflow.reset();

        assert_eq!(workflow.state(), WorkflowState::Idle);
        assert!(states.has_changed().unwrap());
        assert_eq!(lock(workflow.calendar()).get(42), Some(&walk_summary()));
    }

    #[tokio::test]
    async fn reset_after_close_is_ignored() {
        let (workflow, _backend) = workflow(ready_backend());
        workflow
            .submit(date!(2024 - 03 - 05), "Had a great walk")
            .await
            .unwrap();

        workflow.close();
        workflow.reset();

        assert!(matches!(workflow.state(), WorkflowState::Complete { .. }));
    }

    #[tokio::test]
    async fn delete_removes_only_that_entry() {
        let (workflow, backend) = workflow(ready_backend());
        workflow
            .submit(date!(2024 - 03 - 05), "Had a great walk")
            .await
            .unwrap();
        lock(workflow.calendar()).upsert(other_summary());

        workflow.delete(42).await.unwrap();

        let calendar = lock(workflow.calendar());
        assert!(!calendar.contains(42));
        assert_eq!(calendar.get(7), Some(&other_summary()));
        assert!(calendar.detail().is_none());
        drop(calendar);

        assert_eq!(backend.calls().last(), Some(&Step::Delete));
        assert_eq!(workflow.state(), WorkflowState::Idle);
    }

    #[tokio::test]
    async fn failed_delete_keeps_entries() {
        let (workflow, _backend) = workflow(ready_backend().failing(Step::Delete));
        lock(workflow.calendar()).replace_month(vec![walk_summary(), other_summary()]);

        assert!(matches!(
            workflow.delete(42).await,
            Err(WorkflowError::Delete(_))
        ));
        assert_eq!(lock(workflow.calendar()).len(), 2);
    }

    #[tokio::test]
    async fn regenerate_replaces_the_listed_summary() {
        let (workflow, backend) = workflow(ready_backend());
        let mut stale = walk_summary();
        stale.image_url = Some("http://img/old.png".into());
        stale.mood_score = Some(10);
        lock(workflow.calendar()).replace_month(vec![stale, other_summary()]);

        workflow.regenerate(42).await.unwrap();

        assert_eq!(
            backend.calls(),
            vec![Step::Regenerate, Step::GenerateImage, Step::GetDetail]
        );
        let calendar = lock(workflow.calendar());
        assert_eq!(calendar.get(42), Some(&walk_summary()));
        assert_eq!(calendar.len(), 2);
        assert!(!calendar.is_pending(42));
    }

    #[tokio::test]
    async fn regenerate_does_not_insert_unlisted_entries() {
        let (workflow, _backend) = workflow(ready_backend());

        workflow.regenerate(42).await.unwrap();

        assert!(lock(workflow.calendar()).is_empty());
        assert_eq!(lock(workflow.calendar()).detail(), Some(&walk_detail()));
    }

    #[tokio::test]
    async fn failed_regenerate_keeps_previous_entry_visible() {
        let (workflow, _backend) = workflow(ready_backend().failing(Step::GenerateImage));
        let mut previous = walk_detail();
        previous.image_url = Some("http://img/old.png".into());
        {
            let mut calendar = lock(workflow.calendar());
            calendar.upsert(previous.summary());
            calendar.open_detail(previous.clone());
        }

        assert!(matches!(
            workflow.regenerate(42).await,
            Err(WorkflowError::Generation(_))
        ));

        let calendar = lock(workflow.calendar());
        assert_eq!(calendar.get(42), Some(&previous.summary()));
        assert_eq!(calendar.detail(), Some(&previous));
    }

    #[tokio::test]
    async fn regenerate_fetch_failure_keeps_previous_entry_visible() {
        let (workflow, backend) = workflow(ready_backend().failing(Step::GetDetail));
        let mut previous = walk_detail();
        previous.image_url = Some("http://img/old.png".into());
        previous.mood_score = Some(10);
        {
            let mut calendar = lock(workflow.calendar());
            calendar.replace_month(vec![previous.summary(), other_summary()]);
            calendar.open_detail(previous.clone());
        }

        assert!(matches!(
            workflow.regenerate(42).await,
            Err(WorkflowError::Fetch { log_id: 42, .. })
        ));

        assert_eq!(
            backend.calls(),
            vec![Step::Regenerate, Step::GenerateImage, Step::GetDetail]
        );
        let calendar = lock(workflow.calendar());
        assert_eq!(calendar.get(42), Some(&previous.summary()));
        assert_eq!(calendar.get(7), Some(&other_summary()));
        assert_eq!(calendar.detail(), Some(&previous));
        assert!(!calendar.is_pending(42));
        drop(calendar);
        assert_eq!(workflow.state(), WorkflowState::Idle);
    }

    #[tokio::test]
    async fn conflicting_actions_on_one_entry_are_refused() {
        let (workflow, backend) = workflow(ready_backend());
        let _held = PendingGuard::acquire(workflow.calendar(), 42).unwrap();

        assert!(matches!(
            workflow.delete(42).await,
            Err(WorkflowError::Pending(42))
        ));
        assert!(matches!(
            workflow.regenerate(42).await,
            Err(WorkflowError::Pending(42))
        ));
        assert!(backend.calls().is_empty());
    }
}
