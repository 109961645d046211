use std::sync::Arc;
use tracing::debug;

use crate::kernel::time::Period;
use crate::records::store::{RecordStore, StoreError};
use crate::records::types::{InsertOutcome, QuestionRecord, RecordKind, StatusRecord, UserId};

/// At most one record of each kind per user per calendar month.
///
/// `admit` is the advisory read check. The `record_*` methods pair it with
/// the store's insert-or-reject, which is what actually holds the line when
/// two admissions for the same user race.
#[derive(Clone)]
pub struct DedupGuard {
    store: Arc<dyn RecordStore>,
}

impl DedupGuard {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub fn admit(&self, kind: RecordKind, user_id: UserId, period: &Period) -> Result<bool, StoreError> {
        Ok(!self.store.has_record(kind, user_id, period)?)
    }

    /// `period` must be the month `record.created_at` falls in.
    pub fn record_status(&self, record: StatusRecord, period: &Period) -> Result<InsertOutcome, StoreError> {
        if !self.admit(RecordKind::Status, record.user_id, period)? {
            debug!(user_id = record.user_id, %period, "status already recorded");
            return Ok(InsertOutcome::Duplicate);
        }
        self.store.insert_status(record)
    }

    pub fn record_question(&self, record: QuestionRecord, period: &Period) -> Result<InsertOutcome, StoreError> {
        if !self.admit(RecordKind::Question, record.user_id, period)? {
            debug!(user_id = record.user_id, %period, "question already recorded");
            return Ok(InsertOutcome::Duplicate);
        }
        self.store.insert_question(record)
    }
}
