//! Audit log persistence engine
//!
//! Normalizes inbound submissions into entries, appends them to rotating
//! day-partitioned files, and prunes aged files in the background.

mod entry;
mod retention;
mod rotator;
mod sink;

pub use entry::{decode_query, AuditRequest, Body, Entry};
pub use retention::{run_sweeper, sweep_old_files, RetentionPolicy};
pub use rotator::LOG_EXTENSION;
pub use sink::AuditSink;
