use serde::{Deserialize, Serialize};

use crate::kernel::scheduler::Job;
use crate::records::types::{Location, RecordKind, VisaStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TelemetryEvent {
    /// A plain message went through the classifier.
    Classified {
        status: VisaStatus,
        location: Location,
    },

    Recorded { kind: RecordKind },

    DuplicateRejected { kind: RecordKind },

    /// `/ask` without text.
    ValidationFailed,

    StorageFailed,

    JobFired { job: Job },

    JobFailed { job: Job },
}
