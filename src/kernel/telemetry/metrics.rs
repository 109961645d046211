use std::collections::VecDeque;
use super::event::TelemetryEvent;
use crate::records::types::RecordKind;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub classifier_stats: ClassifierStats,
    pub write_stats: WriteStats,
    pub job_stats: JobStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifierStats {
    pub messages: u64,
    /// Both a status and a location were found.
    pub complete: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub statuses_recorded: u64,
    pub questions_recorded: u64,
    pub status_duplicates: u64,
    pub question_duplicates: u64,
    pub validation_failures: u64,
    pub storage_failures: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobStats {
    pub fired: u64,
    pub failed: u64,
}

pub fn compute_snapshot(events: &VecDeque<TelemetryEvent>) -> TelemetrySnapshot {
    let mut snap = TelemetrySnapshot::default();

    for event in events {
        match event {
            TelemetryEvent::Classified { status, location } => {
                snap.classifier_stats.messages += 1;
                if status.is_known() && location.is_known() {
                    snap.classifier_stats.complete += 1;
                }
            }
            TelemetryEvent::Recorded { kind } => match kind {
                RecordKind::Status => snap.write_stats.statuses_recorded += 1,
                RecordKind::Question => snap.write_stats.questions_recorded += 1,
            },
            TelemetryEvent::DuplicateRejected { kind } => match kind {
                RecordKind::Status => snap.write_stats.status_duplicates += 1,
                RecordKind::Question => snap.write_stats.question_duplicates += 1,
            },
            TelemetryEvent::ValidationFailed => snap.write_stats.validation_failures += 1,
            TelemetryEvent::StorageFailed => snap.write_stats.storage_failures += 1,
            TelemetryEvent::JobFired { .. } => snap.job_stats.fired += 1,
            TelemetryEvent::JobFailed { .. } => snap.job_stats.failed += 1,
        }
    }

    snap
}
