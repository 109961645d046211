use crate::records::types::{Location, VisaStatus};

/// A single keyword rule. Patterns are lowercase.
#[derive(Debug, Clone, Copy)]
pub struct Rule<T> {
    pub pattern: &'static str,
    pub tag: T,
}

/// Earlier rules win: "approved" beats "rejected" when both appear.
pub const STATUS_RULES: &[Rule<VisaStatus>] = &[
    Rule { pattern: "approved", tag: VisaStatus::Approved },
    Rule { pattern: "rejected", tag: VisaStatus::Rejected },
];

pub const LOCATION_RULES: &[Rule<Location>] = &[
    Rule { pattern: "mumbai", tag: Location::Mumbai },
    Rule { pattern: "hyderabad", tag: Location::Hyderabad },
    Rule { pattern: "chennai", tag: Location::Chennai },
    Rule { pattern: "delhi", tag: Location::Delhi },
    Rule { pattern: "kolkata", tag: Location::Kolkata },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub status: VisaStatus,
    pub location: Location,
}

impl Classification {
    /// Only fully tagged messages are worth recording.
    pub fn is_complete(&self) -> bool {
        self.status.is_known() && self.location.is_known()
    }
}

/// First rule (in table order) whose pattern occurs in `lowered`.
/// Position in the text does not matter.
pub fn first_match<T: Copy>(rules: &[Rule<T>], lowered: &str) -> Option<T> {
    rules
        .iter()
        .find(|rule| lowered.contains(rule.pattern))
        .map(|rule| rule.tag)
}

pub fn classify(text: &str) -> Classification {
    let lowered = text.to_lowercase();
    Classification {
        status: first_match(STATUS_RULES, &lowered).unwrap_or(VisaStatus::Unknown),
        location: first_match(LOCATION_RULES, &lowered).unwrap_or(Location::Unknown),
    }
}

pub fn locate(text: &str) -> Location {
    first_match(LOCATION_RULES, &text.to_lowercase()).unwrap_or(Location::Unknown)
}
