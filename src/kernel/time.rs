use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};

/// Layout of every persisted timestamp. Matches SQLite's CURRENT_TIMESTAMP.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Source of "now" for the write path, the read path and the scheduler.
/// All three must share one clock so period boundaries agree.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Arc::new(Mutex::new(start)) }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        if let Ok(mut now) = self.now.lock() {
            *now = at;
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Time bucket used for deduplication and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    Month { year: i32, month: u32 },
    Day(NaiveDate),
}

impl Period {
    pub fn month_of(at: DateTime<Utc>) -> Self {
        Period::Month { year: at.year(), month: at.month() }
    }

    pub fn day_of(at: DateTime<Utc>) -> Self {
        Period::Day(at.date_naive())
    }

    /// strftime pattern that truncates a stored timestamp to this period.
    /// Both variants truncate the same `created_at` column, so day and month
    /// filters can never disagree about which bucket a row falls in.
    pub fn truncation(&self) -> &'static str {
        match self {
            Period::Month { .. } => "%Y-%m",
            Period::Day(_) => "%Y-%m-%d",
        }
    }

    /// Bucket key, e.g. `2024-05` or `2024-05-17`.
    pub fn key(&self) -> String {
        match self {
            Period::Month { year, month } => format!("{:04}-{:02}", year, month),
            Period::Day(date) => date.format("%Y-%m-%d").to_string(),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at.format(self.truncation()).to_string() == self.key()
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}
