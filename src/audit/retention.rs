//! Log file retention
//!
//! Periodic cleanup of aged log files. The sweeper runs for the lifetime of
//! the process, takes no lock on the writer path, and works purely from
//! directory listings and per-file metadata.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

use super::rotator::LOG_EXTENSION;

/// Retention configuration, read-only after startup.
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    /// Delete files whose last modification is older than this
    pub max_age: Duration,
    /// Pause between sweeps
    pub sweep_interval: Duration,
}

/// Delete `.log` files in `dir` whose modification time is older than
/// `max_age`.
///
/// Returns the number of files deleted. Subdirectories and files with other
/// extensions are skipped. A stat or delete failure for one file is logged
/// and skipped; it never aborts the sweep for the remaining files.
pub fn sweep_old_files(dir: &Path, max_age: Duration) -> std::io::Result<usize> {
    let cutoff = SystemTime::now()
        .checked_sub(max_age)
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let mut deleted = 0;

    for entry in std::fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Failed to read log directory entry: {}", e);
                continue;
            }
        };
        let path = entry.path();

        if path.is_dir() {
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some(LOG_EXTENSION) {
            continue;
        }

        let modified = match entry.metadata().and_then(|meta| meta.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                warn!("Failed to stat log file {}: {}", path.display(), e);
                continue;
            }
        };

        if modified < cutoff {
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    info!("Deleted old log file: {}", path.display());
                    deleted += 1;
                }
                Err(e) => {
                    warn!("Failed to delete old log file {}: {}", path.display(), e);
                }
            }
        }
    }

    Ok(deleted)
}

/// Run the retention sweep forever on the policy's interval.
///
/// The first sweep happens one full interval after startup. Spawned as an
/// independent task at process init and lives until shutdown.
pub async fn run_sweeper(dir: PathBuf, policy: RetentionPolicy) {
    let mut ticker = tokio::time::interval(policy.sweep_interval);
    // The first tick of a tokio interval completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        match sweep_old_files(&dir, policy.max_age) {
            Ok(0) => debug!("Retention sweep found nothing to delete"),
            Ok(deleted) => info!("Retention sweep deleted {} old log files", deleted),
            Err(e) => warn!("Retention sweep could not read log directory: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    const KEEP_EVERYTHING: Duration = Duration::from_secs(48 * 60 * 60);
    // With a zero max age every existing file is already past its lifetime
    const KEEP_NOTHING: Duration = Duration::ZERO;

    fn touch(path: &Path) {
        File::create(path).unwrap().write_all(b"content").unwrap();
    }

    #[test]
    fn test_sweep_empty_dir() {
        let temp_dir = TempDir::new().unwrap();
        let deleted = sweep_old_files(temp_dir.path(), KEEP_NOTHING).unwrap();
        assert_eq!(deleted, 0);
    }

    #[test]
    fn test_sweep_nonexistent_dir_is_an_error() {
        let result = sweep_old_files(Path::new("/nonexistent/logs/dir"), KEEP_NOTHING);
        assert!(result.is_err());
    }

    #[test]
    fn test_sweep_deletes_expired_log_files() {
        let temp_dir = TempDir::new().unwrap();
        let expired = temp_dir.path().join("audit_2026-08-01.log");
        touch(&expired);
        // Let the clock move past the file's mtime granularity
        std::thread::sleep(Duration::from_millis(20));

        let deleted = sweep_old_files(temp_dir.path(), KEEP_NOTHING).unwrap();
        assert_eq!(deleted, 1);
        assert!(!expired.exists());
    }

    #[test]
    fn test_sweep_retains_young_files() {
        let temp_dir = TempDir::new().unwrap();
        let young = temp_dir.path().join("audit_2026-08-06.log");
        touch(&young);

        let deleted = sweep_old_files(temp_dir.path(), KEEP_EVERYTHING).unwrap();
        assert_eq!(deleted, 0);
        assert!(young.exists());
    }

    #[test]
    fn test_sweep_never_touches_non_log_files() {
        let temp_dir = TempDir::new().unwrap();
        let other = temp_dir.path().join("notes.txt");
        let traps = temp_dir.path().join("audit_2026-08-01.log.bak");
        touch(&other);
        touch(&traps);

        let deleted = sweep_old_files(temp_dir.path(), KEEP_NOTHING).unwrap();
        assert_eq!(deleted, 0);
        assert!(other.exists());
        assert!(traps.exists());
    }

    #[test]
    fn test_sweep_skips_subdirectories() {
        let temp_dir = TempDir::new().unwrap();
        let subdir = temp_dir.path().join("archive.log");
        std::fs::create_dir(&subdir).unwrap();

        let deleted = sweep_old_files(temp_dir.path(), KEEP_NOTHING).unwrap();
        assert_eq!(deleted, 0);
        assert!(subdir.exists());
    }

    #[tokio::test]
    async fn test_sweeper_task_deletes_on_tick() {
        let temp_dir = TempDir::new().unwrap();
        let expired = temp_dir.path().join("audit_2026-08-01.log");
        touch(&expired);

        let policy = RetentionPolicy {
            max_age: KEEP_NOTHING,
            sweep_interval: Duration::from_millis(10),
        };
        let task = tokio::spawn(run_sweeper(temp_dir.path().to_path_buf(), policy));

        tokio::time::sleep(Duration::from_millis(100)).await;
        task.abort();

        assert!(!expired.exists());
    }
}
