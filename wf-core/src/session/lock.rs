//! Exclusive file locking for a session directory (spec.md §4.3, §9 "File
//! locking"), grounded on `fs2::FileExt` (the advisory-lock crate found in
//! the example pack's daemon lifecycle module) and on the original's
//! `session_lock` contextmanager: lock file is `.lock` at the session
//! directory root, default acquisition timeout 10 seconds.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
#[error("failed to acquire lock for session {session_dir} within {timeout_secs}s; another process may be writing to this session")]
pub struct LockTimeout {
    pub session_dir: String,
    pub timeout_secs: f64,
}

/// Holds the exclusive lock on a session directory until dropped. Acquired
/// by [`acquire`]; never constructed directly.
pub struct SessionLockGuard {
    file: File,
    path: PathBuf,
}

impl Drop for SessionLockGuard {
    fn drop(&mut self) {
        if let Err(e) = fs2::FileExt::unlock(&self.file) {
            tracing::debug!(path = %self.path.display(), error = %e, "session_lock_unlock_failed");
        }
        tracing::debug!(path = %self.path.display(), "session_lock_released");
    }
}

/// Acquires an exclusive advisory lock on `session_dir/.lock`, creating the
/// directory and lock file if needed. Polls `try_lock_exclusive` rather
/// than blocking indefinitely so a bounded `timeout` can be enforced; this
/// is a blocking (sync I/O) call and callers from async contexts should run
/// it via `spawn_blocking`.
pub fn acquire(session_dir: &Path, timeout: Duration) -> Result<SessionLockGuard, LockTimeout> {
    std::fs::create_dir_all(session_dir).ok();
    let lock_path = session_dir.join(".lock");
    tracing::debug!(path = %lock_path.display(), timeout_secs = timeout.as_secs_f64(), "session_lock_acquire");

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|_| LockTimeout {
            session_dir: session_dir
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            timeout_secs: timeout.as_secs_f64(),
        })?;

    let start = Instant::now();
    loop {
        match file.try_lock_exclusive() {
            Ok(()) => {
                tracing::debug!(path = %lock_path.display(), "session_lock_acquired");
                return Ok(SessionLockGuard {
                    file,
                    path: lock_path,
                });
            }
            Err(_) if start.elapsed() < timeout => {
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(_) => {
                tracing::error!(path = %lock_path.display(), "session_lock_timeout");
                return Err(LockTimeout {
                    session_dir: session_dir
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default(),
                    timeout_secs: timeout.as_secs_f64(),
                });
            }
        }
    }
}
