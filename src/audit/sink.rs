//! Persistence facade
//!
//! The single entry point the transport layer calls. Normalizes a
//! submission, serializes it, and appends it through the rotator behind the
//! engine's one mutual-exclusion lock.

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use chrono_tz::Tz;
use tracing::info;

use super::entry::{AuditRequest, Entry};
use super::rotator::LogRotator;

/// Timestamp rendering used in persisted records: day-first local time with
/// the zone offset.
const TIMESTAMP_FORMAT: &str = "%d-%m-%Y %H:%M:%S%z";

/// Append-only audit log sink.
///
/// All writes are serialized behind one lock for the full rotate-check +
/// write + flush sequence; concurrent callers block until the current
/// writer finishes. The file handle never leaves the rotator.
pub struct AuditSink {
    rotator: Mutex<LogRotator>,
    timezone: Tz,
}

impl AuditSink {
    /// Create the sink, creating the log directory if it does not exist.
    ///
    /// Failure to create the directory aborts initialization.
    pub fn new(log_dir: PathBuf, max_size_bytes: u64, timezone: Tz) -> Result<Self> {
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

        info!("Audit log directory: {}", log_dir.display());

        Ok(Self {
            rotator: Mutex::new(LogRotator::new(log_dir, max_size_bytes)),
            timezone,
        })
    }

    /// Persist one submission as a single line of the active log file.
    ///
    /// Codec fallbacks have already absorbed decode and serialization
    /// problems by the time the lock is taken; the visible failure modes
    /// are file open, write, and flush errors, which are returned to the
    /// caller unretried.
    pub fn write_log(&self, request: AuditRequest) -> Result<()> {
        let now = Utc::now().with_timezone(&self.timezone);
        let entry = Entry::from_request(request, now.format(TIMESTAMP_FORMAT).to_string());
        let line = entry.to_line().context("Failed to serialize audit entry")?;

        let mut rotator = self
            .rotator
            .lock()
            .map_err(|_| anyhow!("Audit log writer lock poisoned"))?;
        rotator.append(now, &line)
    }
}
