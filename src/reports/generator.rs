use std::fmt::Write;
use std::sync::Arc;

use crate::kernel::time::Period;
use crate::records::store::{RecordStore, StoreError};
use crate::records::types::{Location, VisaStatus};

pub const NO_QUESTIONS_THIS_MONTH: &str = "No questions asked this month.";
pub const NO_QUESTIONS_TODAY: &str = "No questions asked today.";

/// Renders aggregate text straight from the store. Nothing is cached.
#[derive(Clone)]
pub struct ReportGenerator {
    store: Arc<dyn RecordStore>,
}

impl ReportGenerator {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Per-location approval counts for `month`, then every location's questions.
    pub fn monthly_report(&self, month: &Period) -> Result<String, StoreError> {
        let mut out = String::new();
        let _ = writeln!(out, "Monthly Report for {}:", month);
        out.push('\n');

        for location in Location::CANONICAL {
            let approved = self.store.count_status(location, VisaStatus::Approved, month)?;
            let rejected = self.store.count_status(location, VisaStatus::Rejected, month)?;
            let _ = writeln!(out, "{} - Approved: {}, Rejected: {}", location, approved, rejected);
        }

        out.push_str("\nQuestions Asked This Month:\n");
        for location in Location::CANONICAL {
            out.push('\n');
            let header = format!("{} Consulate Questions:", location);
            self.question_block(&mut out, &header, location, month, NO_QUESTIONS_THIS_MONTH)?;
        }
        Ok(out)
    }

    /// One line per observed (location, status) pair for `day`.
    pub fn daily_summary(&self, day: &Period) -> Result<String, StoreError> {
        let mut out = String::from("Daily Visa Analysis:\n\n");
        for row in self.store.count_by_location_and_status(day)? {
            let _ = writeln!(out, "{} - {}: {}", row.location, row.status, row.count);
        }
        Ok(out)
    }

    pub fn daily_question_summary(&self, day: &Period) -> Result<String, StoreError> {
        let mut out = String::from("Daily Question Summary:\n\n");
        for location in Location::CANONICAL {
            let header = format!("Questions for {} consulate:", location);
            self.question_block(&mut out, &header, location, day, NO_QUESTIONS_TODAY)?;
        }
        Ok(out)
    }

    fn question_block(
        &self,
        out: &mut String,
        header: &str,
        location: Location,
        period: &Period,
        placeholder: &str,
    ) -> Result<(), StoreError> {
        let _ = writeln!(out, "{}", header);
        let questions = self.store.list_questions(location, period)?;
        if questions.is_empty() {
            let _ = writeln!(out, "{}", placeholder);
        }
        for question in questions {
            let _ = writeln!(out, "- {}", question);
        }
        Ok(())
    }
}
