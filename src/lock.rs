//! Per-project single-instance lock.
//!
//! A plain PID file rather than an OS advisory lock: a crash leaves a
//! deterministic, inspectable artifact, and the liveness probe (null
//! signal) reclaims stale locks on the next open without user
//! intervention. Concurrent writers to a project's registry are excluded
//! by this lock alone — the JSON files carry no locking of their own.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// A held project lock. Released explicitly or on drop, best-effort.
#[derive(Debug)]
pub struct ProjectLock {
    path: PathBuf,
    released: bool,
}

impl ProjectLock {
    /// Take the lock at `path`, reclaiming it when the recorded PID is not
    /// a live process (or the file is unreadable/garbage).
    pub fn acquire(path: &Path) -> Result<ProjectLock> {
        if let Some(holder) = read_live_holder(path) {
            return Err(Error::AlreadyLocked { holder });
        }

        if path.exists() {
            debug!(path = %path.display(), "reclaiming stale lock");
            let _ = fs::remove_file(path);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, std::process::id().to_string())?;

        Ok(ProjectLock {
            path: path.to_path_buf(),
            released: false,
        })
    }

    /// Delete the lock file. Idempotent; a missing file is success.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to remove lock file");
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ProjectLock {
    fn drop(&mut self) {
        self.release();
    }
}

/// PID recorded in the lock file, if it names a currently-live process.
fn read_live_holder(path: &Path) -> Option<u32> {
    let contents = fs::read_to_string(path).ok()?;
    let pid: u32 = contents.trim().parse().ok()?;
    if pid_alive(pid) { Some(pid) } else { None }
}

#[cfg(unix)]
fn pid_alive(pid: u32) -> bool {
    // Null signal: delivery is not attempted, only permission/existence
    // checks run. EPERM still means the process exists.
    let rc = unsafe { libc::kill(pid as libc::pid_t, 0) };
    if rc == 0 {
        return true;
    }
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn pid_alive(_pid: u32) -> bool {
    // No cheap liveness probe off unix; treat every recorded PID as stale.
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_path(tmp: &tempfile::TempDir) -> PathBuf {
        tmp.path().join("project.lock")
    }

    #[test]
    fn acquire_writes_current_pid() {
        let tmp = tempfile::tempdir().unwrap();
        let path = lock_path(&tmp);

        let _lock = ProjectLock::acquire(&path).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());
    }

    #[test]
    fn stale_lock_is_reclaimed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = lock_path(&tmp);
        // PID max on Linux defaults to well below this, so it can't be live.
        fs::write(&path, "999999").unwrap();

        let _lock = ProjectLock::acquire(&path).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());
    }

    #[test]
    fn garbage_lock_file_is_reclaimed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = lock_path(&tmp);
        fs::write(&path, "not-a-pid\n").unwrap();

        assert!(ProjectLock::acquire(&path).is_ok());
    }

    #[test]
    fn live_holder_blocks_acquire() {
        let tmp = tempfile::tempdir().unwrap();
        let path = lock_path(&tmp);
        // Our own PID is certainly live.
        fs::write(&path, std::process::id().to_string()).unwrap();

        match ProjectLock::acquire(&path) {
            Err(Error::AlreadyLocked { holder }) => assert_eq!(holder, std::process::id()),
            other => panic!("expected AlreadyLocked, got: {other:?}"),
        }
    }

    #[test]
    fn release_removes_the_file_and_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let path = lock_path(&tmp);

        let mut lock = ProjectLock::acquire(&path).unwrap();
        assert!(path.exists());

        lock.release();
        assert!(!path.exists());
        lock.release(); // second release is a no-op
    }

    #[test]
    fn drop_releases_the_lock() {
        let tmp = tempfile::tempdir().unwrap();
        let path = lock_path(&tmp);

        {
            let _lock = ProjectLock::acquire(&path).unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn acquire_creates_missing_parent_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("projects").join("deep").join("project.lock");

        let _lock = ProjectLock::acquire(&path).unwrap();
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn own_pid_is_alive() {
        assert!(pid_alive(std::process::id()));
        assert!(!pid_alive(999_999));
    }
}
