use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type UserId = i64;
pub type RecordId = i64;

/// Outcome of a visa application as reported in chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VisaStatus {
    Approved,
    Rejected,
    Unknown,
}

impl VisaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisaStatus::Approved => "Approved",
            VisaStatus::Rejected => "Rejected",
            VisaStatus::Unknown => "Unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        *self != VisaStatus::Unknown
    }
}

/// Consulate tagging both status and question records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Location {
    Mumbai,
    Hyderabad,
    Chennai,
    Delhi,
    Kolkata,
    Unknown,
}

impl Location {
    /// Fixed report order. Also the classifier's match priority.
    pub const CANONICAL: [Location; 5] = [
        Location::Mumbai,
        Location::Hyderabad,
        Location::Chennai,
        Location::Delhi,
        Location::Kolkata,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Mumbai => "Mumbai",
            Location::Hyderabad => "Hyderabad",
            Location::Chennai => "Chennai",
            Location::Delhi => "Delhi",
            Location::Kolkata => "Kolkata",
            Location::Unknown => "Unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        *self != Location::Unknown
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognised tag: {0}")]
pub struct UnknownTag(pub String);

impl FromStr for VisaStatus {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Approved" => Ok(VisaStatus::Approved),
            "Rejected" => Ok(VisaStatus::Rejected),
            "Unknown" => Ok(VisaStatus::Unknown),
            other => Err(UnknownTag(other.to_string())),
        }
    }
}

impl FromStr for Location {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Mumbai" => Ok(Location::Mumbai),
            "Hyderabad" => Ok(Location::Hyderabad),
            "Chennai" => Ok(Location::Chennai),
            "Delhi" => Ok(Location::Delhi),
            "Kolkata" => Ok(Location::Kolkata),
            "Unknown" => Ok(Location::Unknown),
            other => Err(UnknownTag(other.to_string())),
        }
    }
}

impl fmt::Display for VisaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Status,
    Question,
}

/// A reported visa outcome. Append-only.
/// `id` and `created_at` are assigned by the store when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub id: Option<RecordId>,
    pub user_id: UserId,
    pub status: VisaStatus,
    pub location: Location,
    pub created_at: Option<DateTime<Utc>>,
}

impl StatusRecord {
    pub fn new(user_id: UserId, status: VisaStatus, location: Location) -> Self {
        Self { id: None, user_id, status, location, created_at: None }
    }

    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// A question logged through `/ask`. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub id: Option<RecordId>,
    pub user_id: UserId,
    pub question: String,
    pub location: Location,
    pub created_at: Option<DateTime<Utc>>,
}

impl QuestionRecord {
    pub fn new(user_id: UserId, question: impl Into<String>, location: Location) -> Self {
        Self { id: None, user_id, question: question.into(), location, created_at: None }
    }

    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// One row of the per-day aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub location: Location,
    pub status: VisaStatus,
    pub count: u64,
}

/// Result of an insert-or-reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(RecordId),
    /// A record of the same kind already exists for this user and month.
    Duplicate,
}
