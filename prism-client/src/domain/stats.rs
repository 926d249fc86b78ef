use serde::{Deserialize, Serialize};

/// Keyword frequency row from `GET /admin/stats/keywords`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct KeywordStat {
    #[serde(rename = "keywords", alias = "keyword")]
    pub keyword: String,
    pub count: i64,
}

/// Average mood for one period, from `GET /admin/stats/mood`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodStat {
    pub period: String,
    pub average_score: f64,
}
