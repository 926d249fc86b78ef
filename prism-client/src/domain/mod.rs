mod diary;
mod stats;
mod user;

pub use diary::*;
pub use stats::*;
pub use user::*;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Backend identifier of a diary entry (a mood log).
pub type LogId = i64;

/// Format a date the way the backend expects it (`YYYY-MM-DD`).
pub fn format_date(date: time::Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        date.month() as u8,
        date.day()
    )
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(raw: &str) -> Result<time::Date, time::error::Parse> {
    let format = time::macros::format_description!("[year]-[month]-[day]");
    time::Date::parse(raw.trim(), format)
}
