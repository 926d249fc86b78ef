use serde::{Deserialize, Serialize};
use time::Date;

use super::{iso_date, LogId};

/// Reduced entry shape used to render the calendar.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiaryEntrySummary {
    pub id: LogId,
    #[serde(with = "iso_date")]
    pub date: Date,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub mood_score: Option<i32>,
}

/// Full entry shape shown in the result view.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiaryEntryDetail {
    pub id: LogId,
    #[serde(with = "iso_date")]
    pub date: Date,
    #[serde(default, alias = "keyword")]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    pub content: String,
    #[serde(default)]
    pub mood_score: Option<i32>,
}

impl DiaryEntryDetail {
    /// Project the detail down to what the calendar stores.
    pub fn summary(&self) -> DiaryEntrySummary {
        DiaryEntrySummary {
            id: self.id,
            date: self.date,
            image_url: self.image_url.clone(),
            mood_score: self.mood_score,
        }
    }
}

impl From<&DiaryEntryDetail> for DiaryEntrySummary {
    fn from(detail: &DiaryEntryDetail) -> Self {
        detail.summary()
    }
}

/// Result of the analyze step: the created log and the keywords derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub log_id: LogId,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub representative_mood: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct NewLogRequest<'a> {
    #[serde(with = "iso_date")]
    pub date: Date,
    pub content: &'a str,
}
