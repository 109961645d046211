pub mod config;
pub mod kernel;
pub mod records;
pub mod reports;
pub mod services;

// Re-export specific items for convenient access
pub use kernel::reactor::{Reactor, ReactorConfig};
pub use records::store::{RecordStore, SqliteRecordStore, StoreError};
