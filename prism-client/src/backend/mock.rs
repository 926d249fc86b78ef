//! Scripted backend for exercising the workflow without a network.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use time::Date;
use tokio::sync::watch;

use crate::backend::DiaryBackend;
use crate::domain::{AnalysisResult, DiaryEntryDetail, DiaryEntrySummary, LogId};
use crate::error::{ApiError, ApiResult};
use crate::workflow::{Liveness, WorkflowState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Step {
    Analyze,
    GenerateImage,
    ListMonth,
    GetDetail,
    Delete,
    Regenerate,
}

#[derive(Default)]
pub(crate) struct MockBackend {
    calls: Mutex<Vec<Step>>,
    failing: Mutex<HashSet<Step>>,
    analysis: Mutex<Option<AnalysisResult>>,
    details: Mutex<HashMap<LogId, DiaryEntryDetail>>,
    month: Mutex<Vec<DiaryEntrySummary>>,
    close_on: Mutex<Option<(Step, Liveness)>>,
    observer: Mutex<Option<watch::Receiver<WorkflowState>>>,
    observed: Mutex<Vec<WorkflowState>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_analysis(self, analysis: AnalysisResult) -> Self {
        *self.analysis.lock().unwrap() = Some(analysis);
        self
    }

    pub fn with_detail(self, detail: DiaryEntryDetail) -> Self {
        self.details.lock().unwrap().insert(detail.id, detail);
        self
    }

    pub fn with_month(self, entries: Vec<DiaryEntrySummary>) -> Self {
        *self.month.lock().unwrap() = entries;
        self
    }

    pub fn failing(self, step: Step) -> Self {
        self.failing.lock().unwrap().insert(step);
        self
    }

    pub fn succeed(&self, step: Step) {
        self.failing.lock().unwrap().remove(&step);
    }

    /// Close `liveness` while `step` is in flight, as if the view was dismissed.
    pub fn close_on(&self, step: Step, liveness: Liveness) {
        *self.close_on.lock().unwrap() = Some((step, liveness));
    }

    /// Record the workflow state seen at each call.
    pub fn observe(&self, receiver: watch::Receiver<WorkflowState>) {
        *self.observer.lock().unwrap() = Some(receiver);
    }

    pub fn calls(&self) -> Vec<Step> {
        self.calls.lock().unwrap().clone()
    }

    pub fn observed(&self) -> Vec<WorkflowState> {
        self.observed.lock().unwrap().clone()
    }

    fn record(&self, step: Step) -> ApiResult<()> {
        self.calls.lock().unwrap().push(step);

        if let Some(receiver) = self.observer.lock().unwrap().as_ref() {
            self.observed
                .lock()
                .unwrap()
                .push(receiver.borrow().clone());
        }

        if let Some((close_step, liveness)) = self.close_on.lock().unwrap().as_ref() {
            if *close_step == step {
                liveness.close();
            }
        }

        if self.failing.lock().unwrap().contains(&step) {
            return Err(ApiError::backend(format!("{:?}", step), "scripted failure"));
        }
        Ok(())
    }

    fn scripted_analysis(&self, log_id: Option<LogId>) -> ApiResult<AnalysisResult> {
        let mut analysis = self
            .analysis
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ApiError::backend("analyze", "no analysis scripted"))?;
        if let Some(log_id) = log_id {
            analysis.log_id = log_id;
        }
        Ok(analysis)
    }
}

#[async_trait]
impl DiaryBackend for MockBackend {
    async fn analyze(&self, _date: Date, _content: &str) -> ApiResult<AnalysisResult> {
        self.record(Step::Analyze)?;
        self.scripted_analysis(None)
    }

    async fn generate_image(&self, log_id: LogId) -> ApiResult<LogId> {
        self.record(Step::GenerateImage)?;
        Ok(log_id)
    }

    async fn list_month(&self, _year: i32, _month: u8) -> ApiResult<Vec<DiaryEntrySummary>> {
        self.record(Step::ListMonth)?;
        Ok(self.month.lock().unwrap().clone())
    }

    async fn get_detail(&self, log_id: LogId) -> ApiResult<DiaryEntryDetail> {
        self.record(Step::GetDetail)?;
        self.details
            .lock()
            .unwrap()
            .get(&log_id)
            .cloned()
            .ok_or_else(|| ApiError::backend("GET /logs/:id", "not found"))
    }

    async fn delete(&self, log_id: LogId) -> ApiResult<()> {
        self.record(Step::Delete)?;
        self.details.lock().unwrap().remove(&log_id);
        Ok(())
    }

    async fn regenerate(&self, log_id: LogId) -> ApiResult<AnalysisResult> {
        self.record(Step::Regenerate)?;
        self.scripted_analysis(Some(log_id))
    }
}
