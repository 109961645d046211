//! Pipeline telemetry.
//!
//! Telemetry is a read-only side layer: the reactor records into it, nothing
//! reads from it to make a decision. Events carry tags and kinds only, never
//! message or question text.

pub mod event;
pub mod metrics;
pub mod recorder;
