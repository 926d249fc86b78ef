//! Seams between the client logic and whatever answers the REST calls.
//!
//! [`crate::ApiClient`] talks to the real backend, [`crate::DevBackend`] keeps
//! everything in memory, and tests script their own implementations.

#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;
use time::Date;

use crate::domain::{
    AnalysisResult, DiaryEntryDetail, DiaryEntrySummary, GuestLogin, KeywordStat, LogId, MoodStat,
};
use crate::error::ApiResult;

/// Diary operations used by the calendar and the workflow controller.
#[async_trait]
pub trait DiaryBackend: Send + Sync {
    /// Store a new entry and analyze it into keywords and a mood score.
    async fn analyze(&self, date: Date, content: &str) -> ApiResult<AnalysisResult>;

    /// Generate the image for an analyzed entry. Returns the entry id.
    async fn generate_image(&self, log_id: LogId) -> ApiResult<LogId>;

    async fn list_month(&self, year: i32, month: u8) -> ApiResult<Vec<DiaryEntrySummary>>;

    async fn get_detail(&self, log_id: LogId) -> ApiResult<DiaryEntryDetail>;

    async fn delete(&self, log_id: LogId) -> ApiResult<()>;

    /// Drop the previous analysis and image of an entry and analyze its text again.
    async fn regenerate(&self, log_id: LogId) -> ApiResult<AnalysisResult>;
}

#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn guest_login(&self) -> ApiResult<GuestLogin>;
}

/// Aggregate statistics. The backend only answers these for admins.
#[async_trait]
pub trait StatsBackend: Send + Sync {
    async fn keyword_stats(
        &self,
        year: Option<i32>,
        month: Option<u8>,
    ) -> ApiResult<Vec<KeywordStat>>;

    async fn mood_stats(&self, year: Option<i32>) -> ApiResult<Vec<MoodStat>>;
}
