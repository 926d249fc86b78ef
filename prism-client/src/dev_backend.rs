use async_trait::async_trait;
use jsonwebtoken::{encode, EncodingKey, Header};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use time::{Date, Duration, OffsetDateTime};

use crate::backend::{AuthBackend, DiaryBackend, StatsBackend};
use crate::domain::{
    AnalysisResult, DiaryEntryDetail, DiaryEntrySummary, GuestLogin, KeywordStat, LogId, MoodStat,
    GUEST_EMAIL, GUEST_NICKNAME,
};
use crate::error::{ApiError, ApiResult};

const DEV_TOKEN_SECRET: &[u8] = b"prism-dev";

const POSITIVE: [&str; 8] = [
    "great", "happy", "good", "sunny", "fun", "love", "calm", "walk",
];
const NEGATIVE: [&str; 6] = ["sad", "tired", "rain", "angry", "bad", "lonely"];
const STOPWORDS: [&str; 8] = [
    "with", "that", "this", "have", "from", "were", "today", "very",
];

/// In-memory stand-in for the backend, used by `prism --dev`.
#[derive(Debug, Clone)]
pub struct DevBackend {
    store: Arc<Mutex<DevStore>>,
}

#[derive(Debug)]
struct DevStore {
    next_id: LogId,
    entries: BTreeMap<LogId, DevEntry>,
}

#[derive(Debug, Clone)]
struct DevEntry {
    id: LogId,
    date: Date,
    content: String,
    keywords: Vec<String>,
    mood_score: i32,
    image_url: Option<String>,
}

impl DevEntry {
    fn summary(&self) -> DiaryEntrySummary {
        DiaryEntrySummary {
            id: self.id,
            date: self.date,
            image_url: self.image_url.clone(),
            mood_score: Some(self.mood_score),
        }
    }

    fn detail(&self) -> DiaryEntryDetail {
        DiaryEntryDetail {
            id: self.id,
            date: self.date,
            keywords: self.keywords.clone(),
            image_url: self.image_url.clone(),
            content: self.content.clone(),
            mood_score: Some(self.mood_score),
        }
    }

    fn analysis(&self) -> AnalysisResult {
        AnalysisResult {
            log_id: self.id,
            keywords: self.keywords.clone(),
            representative_mood: Some(representative_mood(self.mood_score).to_string()),
        }
    }
}

impl Default for DevBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DevBackend {
    pub fn new() -> Self {
        let today = OffsetDateTime::now_utc().date();
        Self::seeded(seed_dev_entries(today))
    }

    pub fn empty() -> Self {
        Self::seeded(vec![])
    }

    fn seeded(entries: Vec<DevEntry>) -> Self {
        let next_id = entries.iter().map(|e| e.id).max().unwrap_or(0) + 1;
        Self {
            store: Arc::new(Mutex::new(DevStore {
                next_id,
                entries: entries.into_iter().map(|e| (e.id, e)).collect(),
            })),
        }
    }

    fn with_entry<T>(
        &self,
        log_id: LogId,
        call: &str,
        f: impl FnOnce(&mut DevEntry) -> T,
    ) -> ApiResult<T> {
        let mut store = self.store.lock().expect("dev store lock poisoned");
        store
            .entries
            .get_mut(&log_id)
            .map(f)
            .ok_or_else(|| ApiError::Backend {
                call: call.to_string(),
                status: Some(404),
                message: format!("Diary entry {} not found", log_id),
            })
    }

    fn entries_between(&self, from: Date, to: Date) -> Vec<DevEntry> {
        self.store
            .lock()
            .expect("dev store lock poisoned")
            .entries
            .values()
            .filter(|e| e.date >= from && e.date <= to)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl DiaryBackend for DevBackend {
    async fn analyze(&self, date: Date, content: &str) -> ApiResult<AnalysisResult> {
        let (keywords, mood_score) = analyze_text(content);

        let mut store = self.store.lock().expect("dev store lock poisoned");
        let id = store.next_id;
        store.next_id += 1;

        let entry = DevEntry {
            id,
            date,
            content: content.to_string(),
            keywords,
            mood_score,
            image_url: None,
        };
        let analysis = entry.analysis();
        store.entries.insert(id, entry);
        Ok(analysis)
    }

    async fn generate_image(&self, log_id: LogId) -> ApiResult<LogId> {
        self.with_entry(log_id, "POST /logs/:id/image", |entry| {
            entry.image_url = Some(dev_image_url(entry));
            entry.id
        })
    }

    async fn list_month(&self, year: i32, month: u8) -> ApiResult<Vec<DiaryEntrySummary>> {
        let store = self.store.lock().expect("dev store lock poisoned");
        let mut entries: Vec<_> = store
            .entries
            .values()
            .filter(|e| e.date.year() == year && e.date.month() as u8 == month)
            .map(DevEntry::summary)
            .collect();
        entries.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
        Ok(entries)
    }

    async fn get_detail(&self, log_id: LogId) -> ApiResult<DiaryEntryDetail> {
        self.with_entry(log_id, "GET /logs/:id", |entry| entry.detail())
    }

    async fn delete(&self, log_id: LogId) -> ApiResult<()> {
        let removed = self
            .store
            .lock()
            .expect("dev store lock poisoned")
            .entries
            .remove(&log_id);

        match removed {
            Some(_) => Ok(()),
            None => Err(ApiError::Backend {
                call: "DELETE /logs/:id".to_string(),
                status: Some(404),
                message: format!("Diary entry {} not found", log_id),
            }),
        }
    }

    async fn regenerate(&self, log_id: LogId) -> ApiResult<AnalysisResult> {
        self.with_entry(log_id, "POST /logs/:id/regenerate", |entry| {
            let (keywords, mood_score) = analyze_text(&entry.content);
            entry.keywords = keywords;
            entry.mood_score = mood_score;
            entry.image_url = None;
            entry.analysis()
        })
    }
}

#[async_trait]
impl AuthBackend for DevBackend {
    async fn guest_login(&self) -> ApiResult<GuestLogin> {
        let claims = serde_json::json!({
            "sub": "0",
            "email": GUEST_EMAIL,
            "nickname": GUEST_NICKNAME,
            "role": "ROLE_USER",
            "exp": (OffsetDateTime::now_utc() + Duration::days(1)).unix_timestamp(),
        });
        let access_token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(DEV_TOKEN_SECRET),
        )
        .map_err(|e| ApiError::backend("GET /auth/guest", e.to_string()))?;

        Ok(GuestLogin {
            access_token,
            nickname: Some(GUEST_NICKNAME.to_string()),
            id: Some(0),
        })
    }
}

#[async_trait]
impl StatsBackend for DevBackend {
    async fn keyword_stats(
        &self,
        year: Option<i32>,
        month: Option<u8>,
    ) -> ApiResult<Vec<KeywordStat>> {
        let (from, to) = stats_period(year.filter(|y| *y != 0), month.filter(|m| *m != 0))?;

        let mut counts: HashMap<String, i64> = HashMap::new();
        for entry in self.entries_between(from, to) {
            for keyword in entry.keywords {
                *counts.entry(keyword).or_default() += 1;
            }
        }

        let mut stats: Vec<KeywordStat> = counts
            .into_iter()
            .map(|(keyword, count)| KeywordStat { keyword, count })
            .collect();
        stats.sort_by(|a, b| b.count.cmp(&a.count).then(a.keyword.cmp(&b.keyword)));
        stats.truncate(3);
        Ok(stats)
    }

    async fn mood_stats(&self, year: Option<i32>) -> ApiResult<Vec<MoodStat>> {
        let year = year
            .filter(|y| *y != 0)
            .unwrap_or_else(|| OffsetDateTime::now_utc().year());
        let (from, to) = stats_period(Some(year), None)?;

        let mut by_month: BTreeMap<u8, (i64, i64)> = BTreeMap::new();
        for entry in self.entries_between(from, to) {
            let slot = by_month.entry(entry.date.month() as u8).or_default();
            slot.0 += entry.mood_score as i64;
            slot.1 += 1;
        }

        Ok(by_month
            .into_iter()
            .map(|(month, (total, count))| MoodStat {
                period: format!("{:04}-{:02}", year, month),
                average_score: total as f64 / count as f64,
            })
            .collect())
    }
}

fn invalid_period(reason: impl ToString) -> ApiError {
    ApiError::Backend {
        call: "GET /admin/stats".to_string(),
        status: Some(400),
        message: reason.to_string(),
    }
}

/// Date range the stats endpoints cover: everything, one year, or one month.
fn stats_period(year: Option<i32>, month: Option<u8>) -> ApiResult<(Date, Date)> {
    match (year, month) {
        (None, _) => {
            let from = Date::from_calendar_date(2000, time::Month::January, 1)
                .map_err(invalid_period)?;
            Ok((from, OffsetDateTime::now_utc().date() + Duration::days(1)))
        }
        (Some(year), None) => Ok((
            Date::from_calendar_date(year, time::Month::January, 1).map_err(invalid_period)?,
            Date::from_calendar_date(year, time::Month::December, 31).map_err(invalid_period)?,
        )),
        (Some(year), Some(month)) => {
            let month = time::Month::try_from(month).map_err(invalid_period)?;
            let from = Date::from_calendar_date(year, month, 1).map_err(invalid_period)?;
            let to = Date::from_calendar_date(year, month, month.length(year))
                .map_err(invalid_period)?;
            Ok((from, to))
        }
    }
}

fn dev_image_url(entry: &DevEntry) -> String {
    format!(
        "http://localhost/dev-images/{}-{}.png",
        entry.id,
        entry.keywords.join("-")
    )
}

fn representative_mood(score: i32) -> &'static str {
    match score {
        70.. => "joy",
        40..=69 => "calm",
        _ => "gloomy",
    }
}

/// Crude stand-in for the AI analysis: the longest distinct words become
/// keywords, and a small word list nudges the mood score.
fn analyze_text(content: &str) -> (Vec<String>, i32) {
    let words: Vec<String> = content
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();

    let mut keywords: Vec<String> = Vec::new();
    for word in &words {
        if word.chars().count() >= 4
            && !STOPWORDS.contains(&word.as_str())
            && !keywords.contains(word)
        {
            keywords.push(word.clone());
        }
    }
    keywords.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
    keywords.truncate(3);

    let positive = words
        .iter()
        .filter(|w| POSITIVE.contains(&w.as_str()))
        .count() as i32;
    let negative = words
        .iter()
        .filter(|w| NEGATIVE.contains(&w.as_str()))
        .count() as i32;
    let score = (50 + 10 * positive - 10 * negative).clamp(0, 100);

    (keywords, score)
}

fn seed_dev_entries(today: Date) -> Vec<DevEntry> {
    let entry = |id: LogId, days_ago: i64, content: &str| {
        let (keywords, mood_score) = analyze_text(content);
        let mut entry = DevEntry {
            id,
            date: today - Duration::days(days_ago),
            content: content.to_string(),
            keywords,
            mood_score,
            image_url: None,
        };
        entry.image_url = Some(dev_image_url(&entry));
        entry
    };

    vec![
        entry(1, 2, "Rainy morning, tired after the late train home."),
        entry(2, 1, "Long walk along the river, sunny and calm."),
        entry(3, 0, "Coffee with friends, a good and happy afternoon."),
    ]
}
