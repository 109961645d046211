pub mod classifier;
pub mod dedup;
pub mod event;
pub mod reactor;
pub mod scheduler;
pub mod telemetry;
pub mod time;
