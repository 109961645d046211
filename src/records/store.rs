//! SQLite-backed record store.
//!
//! Both tables are append-only. Per-user monthly uniqueness lives in the
//! schema (`UNIQUE(user_id, month)`), so insert-or-reject is a single atomic
//! statement and concurrent admissions for the same user cannot both win.

use crate::kernel::time::{Clock, Period, SystemClock, TIMESTAMP_FORMAT};
use crate::records::types::{
    InsertOutcome, Location, QuestionRecord, RecordKind, StatusCount, StatusRecord, UserId,
    VisaStatus,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("connection lock poisoned")]
    Poisoned,
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Query/insert contract for status and question records.
pub trait RecordStore: Send + Sync {
    fn insert_status(&self, record: StatusRecord) -> Result<InsertOutcome, StoreError>;
    fn insert_question(&self, record: QuestionRecord) -> Result<InsertOutcome, StoreError>;
    fn has_record(&self, kind: RecordKind, user_id: UserId, period: &Period) -> Result<bool, StoreError>;
    fn count_status(&self, location: Location, status: VisaStatus, period: &Period) -> Result<u64, StoreError>;
    /// Question texts in chronological order.
    fn list_questions(&self, location: Location, period: &Period) -> Result<Vec<String>, StoreError>;
    /// Observed (location, status) pairs, ordered by location then status.
    fn count_by_location_and_status(&self, period: &Period) -> Result<Vec<StatusCount>, StoreError>;
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS visa_status (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    status TEXT NOT NULL,
    location TEXT NOT NULL,
    created_at TEXT NOT NULL,
    month TEXT NOT NULL,
    UNIQUE(user_id, month)
);
CREATE INDEX IF NOT EXISTS idx_visa_status_created_at ON visa_status(created_at);

CREATE TABLE IF NOT EXISTS questions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    question TEXT NOT NULL,
    location TEXT NOT NULL,
    created_at TEXT NOT NULL,
    month TEXT NOT NULL,
    UNIQUE(user_id, month)
);
CREATE INDEX IF NOT EXISTS idx_questions_location_created_at ON questions(location, created_at);
"#;

pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
    path: Option<PathBuf>,
}

impl SqliteRecordStore {
    /// Open or create the database file and ensure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::init(conn, Some(path))
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        debug!(path = ?path, "record store ready");
        Ok(Self {
            conn: Mutex::new(conn),
            clock: Arc::new(SystemClock),
            path,
        })
    }

    /// Clock used to stamp records that arrive without a timestamp.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Flush and release the connection.
    pub fn close(self) -> Result<(), StoreError> {
        let conn = self.conn.into_inner().map_err(|_| StoreError::Poisoned)?;
        conn.close().map_err(|(_, e)| StoreError::Sqlite(e))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn stamp(&self, created_at: Option<DateTime<Utc>>) -> (String, String) {
        let at = created_at.unwrap_or_else(|| self.clock.now());
        (at.format(TIMESTAMP_FORMAT).to_string(), Period::month_of(at).key())
    }

    fn outcome(conn: &Connection, changed: usize) -> InsertOutcome {
        if changed == 0 {
            InsertOutcome::Duplicate
        } else {
            InsertOutcome::Inserted(conn.last_insert_rowid())
        }
    }
}

fn table(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Status => "visa_status",
        RecordKind::Question => "questions",
    }
}

impl RecordStore for SqliteRecordStore {
    fn insert_status(&self, record: StatusRecord) -> Result<InsertOutcome, StoreError> {
        let (created_at, month) = self.stamp(record.created_at);
        let conn = self.lock()?;
        let changed = conn.execute(
            "INSERT INTO visa_status (id, user_id, status, location, created_at, month)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(user_id, month) DO NOTHING",
            params![
                record.id,
                record.user_id,
                record.status.as_str(),
                record.location.as_str(),
                created_at,
                month
            ],
        )?;
        Ok(Self::outcome(&conn, changed))
    }

    fn insert_question(&self, record: QuestionRecord) -> Result<InsertOutcome, StoreError> {
        let (created_at, month) = self.stamp(record.created_at);
        let conn = self.lock()?;
        let changed = conn.execute(
            "INSERT INTO questions (id, user_id, question, location, created_at, month)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(user_id, month) DO NOTHING",
            params![
                record.id,
                record.user_id,
                record.question,
                record.location.as_str(),
                created_at,
                month
            ],
        )?;
        Ok(Self::outcome(&conn, changed))
    }

    fn has_record(&self, kind: RecordKind, user_id: UserId, period: &Period) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE user_id = ?1 AND strftime(?2, created_at) = ?3)",
            table(kind)
        );
        let exists: bool = conn.query_row(
            &sql,
            params![user_id, period.truncation(), period.key()],
            |r| r.get(0),
        )?;
        Ok(exists)
    }

    fn count_status(&self, location: Location, status: VisaStatus, period: &Period) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM visa_status
             WHERE location = ?1 AND status = ?2 AND strftime(?3, created_at) = ?4",
            params![location.as_str(), status.as_str(), period.truncation(), period.key()],
            |r| r.get(0),
        )?;
        Ok(count as u64)
    }

    fn list_questions(&self, location: Location, period: &Period) -> Result<Vec<String>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT question FROM questions
             WHERE location = ?1 AND strftime(?2, created_at) = ?3
             ORDER BY created_at ASC, id ASC",
        )?;
        let rows = stmt
            .query_map(
                params![location.as_str(), period.truncation(), period.key()],
                |r| r.get::<_, String>(0),
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn count_by_location_and_status(&self, period: &Period) -> Result<Vec<StatusCount>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT location, status, COUNT(*) FROM visa_status
             WHERE strftime(?1, created_at) = ?2
             GROUP BY location, status
             ORDER BY location ASC, status ASC",
        )?;
        let raw = stmt
            .query_map(params![period.truncation(), period.key()], |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?, r.get::<_, i64>(2)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(location, status, count)| {
                Ok(StatusCount {
                    location: location.parse().map_err(|e| StoreError::Corrupt(format!("{}", e)))?,
                    status: status.parse().map_err(|e| StoreError::Corrupt(format!("{}", e)))?,
                    count: count as u64,
                })
            })
            .collect()
    }
}
