//! Textual timestamp format used by every TEXT time column.
//!
//! Values are UTC with microsecond precision and a literal `+00:00` offset.
//! The format is fixed-width, so string order equals time order and SQL
//! comparisons on these columns need no date functions.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};

pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f+00:00";

/// Current time truncated to what the column can represent.
#[must_use]
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[must_use]
pub fn format(ts: DateTime<Utc>) -> String {
    ts.format(FORMAT).to_string()
}

pub fn parse(value: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, FORMAT)
        .map(|naive| naive.and_utc())
        .with_context(|| format!("Invalid timestamp '{value}'"))
}
