//! The calendar's entry set, the one piece of state shared by every workflow.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use time::Date;

use crate::backend::DiaryBackend;
use crate::domain::{DiaryEntryDetail, DiaryEntrySummary, LogId};
use crate::error::ApiResult;

pub type SharedCalendar = Arc<Mutex<Calendar>>;

/// What a click on a calendar day should open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarAction {
    /// No entry on that day: open the write flow.
    Create { date: Date },
    /// An entry exists: open its detail view.
    Open { id: LogId },
}

#[derive(Debug, Default)]
pub struct Calendar {
    entries: BTreeMap<LogId, DiaryEntrySummary>,
    detail: Option<DiaryEntryDetail>,
    pending: HashSet<LogId>,
}

impl Calendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedCalendar {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn replace_month(&mut self, entries: Vec<DiaryEntrySummary>) {
        self.entries = entries.into_iter().map(|entry| (entry.id, entry)).collect();
    }

    /// Insert or overwrite the entry with the same id. Last write wins.
    pub fn upsert(&mut self, summary: DiaryEntrySummary) -> Option<DiaryEntrySummary> {
        self.entries.insert(summary.id, summary)
    }

    /// Remove an entry, closing the detail view if it shows that entry.
    pub fn remove(&mut self, id: LogId) -> Option<DiaryEntrySummary> {
        if self.detail.as_ref().is_some_and(|detail| detail.id == id) {
            self.detail = None;
        }
        self.entries.remove(&id)
    }

    pub fn get(&self, id: LogId) -> Option<&DiaryEntrySummary> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: LogId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn entry_on(&self, date: Date) -> Option<&DiaryEntrySummary> {
        self.entries.values().find(|entry| entry.date == date)
    }

    /// Entries ordered by date, then id.
    pub fn entries(&self) -> Vec<&DiaryEntrySummary> {
        let mut entries: Vec<_> = self.entries.values().collect();
        entries.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn click(&self, date: Date) -> CalendarAction {
        match self.entry_on(date) {
            Some(entry) => CalendarAction::Open { id: entry.id },
            None => CalendarAction::Create { date },
        }
    }

    pub fn open_detail(&mut self, detail: DiaryEntryDetail) {
        self.detail = Some(detail);
    }

    pub fn close_detail(&mut self) {
        self.detail = None;
    }

    pub fn detail(&self) -> Option<&DiaryEntryDetail> {
        self.detail.as_ref()
    }

    pub fn is_pending(&self, id: LogId) -> bool {
        self.pending.contains(&id)
    }
}

pub(crate) fn lock(calendar: &SharedCalendar) -> MutexGuard<'_, Calendar> {
    calendar.lock().expect("calendar lock poisoned")
}

/// Marks an entry as having an action in flight until dropped.
#[derive(Debug)]
pub struct PendingGuard {
    calendar: SharedCalendar,
    id: LogId,
}

impl PendingGuard {
    /// Claim `id`, or `None` when another action already holds it.
    pub fn acquire(calendar: &SharedCalendar, id: LogId) -> Option<Self> {
        if !lock(calendar).pending.insert(id) {
            return None;
        }
        Some(Self {
            calendar: calendar.clone(),
            id,
        })
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.calendar
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pending
            .remove(&self.id);
    }
}

/// Fetch one month from the backend and make it the calendar's entry set.
pub async fn load_month<B: DiaryBackend + ?Sized>(
    calendar: &SharedCalendar,
    backend: &B,
    year: i32,
    month: u8,
) -> ApiResult<usize> {
    let entries = backend.list_month(year, month).await?;
    let count = entries.len();
    lock(calendar).replace_month(entries);
    tracing::debug!(year, month, count, "calendar month loaded");
    Ok(count)
}

/// Fetch an entry's detail and show it. A listed entry is refreshed from the
/// detail so both views agree.
pub async fn open_entry<B: DiaryBackend + ?Sized>(
    calendar: &SharedCalendar,
    backend: &B,
    id: LogId,
) -> ApiResult<DiaryEntryDetail> {
    let detail = backend.get_detail(id).await?;

    let mut calendar = lock(calendar);
    if calendar.contains(id) {
        calendar.upsert(detail.summary());
    }
    calendar.open_detail(detail.clone());
    Ok(detail)
}
