//! Log file rotation
//!
//! Owns the single active output file and decides, before every append,
//! whether it must be replaced: reopened when the calendar day changes,
//! archived and reopened when the size cap is exceeded.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::DateTime;
use chrono_tz::Tz;

/// File extension shared by active and archived log files
pub const LOG_EXTENSION: &str = "log";

/// The currently open append target: its path, handle, and the byte size
/// observed so far.
struct ActiveFile {
    path: PathBuf,
    file: File,
    size: u64,
}

impl ActiveFile {
    /// Open (or create) `path` in append mode.
    ///
    /// The observed size is seeded from file metadata since the file may
    /// already hold records from an earlier process run.
    fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;

        let size = file
            .metadata()
            .with_context(|| format!("Failed to stat log file {}", path.display()))?
            .len();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            size,
        })
    }
}

/// Keeps the active file correct for every write.
///
/// Exactly one `ActiveFile` exists at a time and nothing outside this type
/// ever sees the handle. Callers serialize access externally; see
/// [`crate::audit::AuditSink`].
pub struct LogRotator {
    dir: PathBuf,
    max_size: u64,
    active: Option<ActiveFile>,
}

impl LogRotator {
    /// Create a rotator writing into `dir`.
    ///
    /// `max_size` of zero disables size-based rotation.
    pub fn new(dir: PathBuf, max_size: u64) -> Self {
        Self {
            dir,
            max_size,
            active: None,
        }
    }

    /// Path of the active log file for the given instant.
    pub fn file_path_for(&self, now: DateTime<Tz>) -> PathBuf {
        self.dir
            .join(format!("audit_{}.{}", now.format("%Y-%m-%d"), LOG_EXTENSION))
    }

    /// Append one fully serialized record and flush it to disk.
    ///
    /// The rotation check runs unconditionally first; the record is written
    /// in a single call so a failure never leaves a partial line behind, and
    /// `sync_all` makes the bytes durable before this returns.
    pub fn append(&mut self, now: DateTime<Tz>, record: &[u8]) -> Result<()> {
        let active = self.ensure_file(now)?;

        active
            .file
            .write_all(record)
            .with_context(|| format!("Failed to write to log file {}", active.path.display()))?;
        active.size += record.len() as u64;

        active
            .file
            .sync_all()
            .with_context(|| format!("Failed to flush log file {}", active.path.display()))?;

        Ok(())
    }

    /// Make sure the open handle is the right file for `now`.
    ///
    /// Opens the day's file if none is open or the day rolled over, then
    /// archives and reopens if the observed size exceeds the cap. The entry
    /// that trips the cap always lands in the fresh file.
    fn ensure_file(&mut self, now: DateTime<Tz>) -> Result<&mut ActiveFile> {
        let expected = self.file_path_for(now);

        // Day rollover (or first write): drop the stale handle, which closes
        // it with any close error ignored, and open today's file.
        let mut active = match self.active.take() {
            Some(active) if active.path == expected => active,
            _ => ActiveFile::open(&expected)?,
        };

        if self.max_size > 0 && active.size > self.max_size {
            // Close before rename so the archived file is complete on disk.
            drop(active);
            let archived = self.next_archive_path(now);
            std::fs::rename(&expected, &archived).with_context(|| {
                format!("Failed to archive log file to {}", archived.display())
            })?;
            active = ActiveFile::open(&expected)?;
        }

        Ok(self.active.insert(active))
    }

    /// Archive name for a size rotation at `now`.
    ///
    /// Forced rotations within the same second get a numeric suffix so no
    /// archive is ever overwritten.
    fn next_archive_path(&self, now: DateTime<Tz>) -> PathBuf {
        let stem = format!(
            "audit_{}_{}",
            now.format("%Y-%m-%d"),
            now.format("%H-%M-%S")
        );

        let candidate = self.dir.join(format!("{}.{}", stem, LOG_EXTENSION));
        if !candidate.exists() {
            return candidate;
        }

        let mut n = 1u32;
        loop {
            let candidate = self.dir.join(format!("{}_{}.{}", stem, n, LOG_EXTENSION));
            if !candidate.exists() {
                return candidate;
            }
            n += 1;
        }
    }
}
