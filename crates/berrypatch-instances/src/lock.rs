//! Per-instance advisory locks
//!
//! Lock files live next to the instance directories
//! (`<instances>/.<id>.lock`) so removing an instance never deletes a lock
//! another process may be waiting on.

use berrypatch_core::{Error, Result};
use fs4::fs_std::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

const RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Exclusive lock on one instance, released on drop
///
/// Mutating [`InstanceStore`](crate::InstanceStore) operations take a
/// reference to this guard, so they cannot run unlocked.
#[derive(Debug)]
pub struct InstanceLock {
    instance_id: String,
    path: PathBuf,
    // Held for its lock; closing the handle releases it.
    _file: File,
}

impl InstanceLock {
    /// Acquire the lock at `path`, polling until `timeout` elapses
    ///
    /// Waits on the tokio timer, so other tasks keep running meanwhile.
    pub async fn acquire(instance_id: &str, path: &Path, timeout: Duration) -> Result<Self> {
        let file = open_lock_file(path)?;
        let deadline = Instant::now() + timeout;
        while !try_lock(&file)? {
            if Instant::now() >= deadline {
                return Err(Error::instance_busy(instance_id, path));
            }
            tokio::time::sleep(RETRY_INTERVAL).await;
        }
        Ok(Self::held(instance_id, path, file))
    }

    /// [`acquire`](Self::acquire) for callers outside a runtime
    pub fn acquire_blocking(instance_id: &str, path: &Path, timeout: Duration) -> Result<Self> {
        let file = open_lock_file(path)?;
        let deadline = Instant::now() + timeout;
        while !try_lock(&file)? {
            if Instant::now() >= deadline {
                return Err(Error::instance_busy(instance_id, path));
            }
            thread::sleep(RETRY_INTERVAL);
        }
        Ok(Self::held(instance_id, path, file))
    }

    fn held(instance_id: &str, path: &Path, file: File) -> Self {
        debug!("Acquired lock for {} at {}", instance_id, path.display());
        Self {
            instance_id: instance_id.to_string(),
            path: path.to_path_buf(),
            _file: file,
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this guard covers `instance_id`
    pub(crate) fn covers(&self, instance_id: &str) -> bool {
        self.instance_id == instance_id
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)?)
}

fn try_lock(file: &File) -> Result<bool> {
    match file.try_lock_exclusive() {
        Ok(locked) => Ok(locked),
        Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_second_acquire_times_out() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".web.lock");

        let held = InstanceLock::acquire("web", &path, Duration::from_secs(1))
            .await
            .unwrap();
        let started = Instant::now();
        let err = InstanceLock::acquire("web", &path, Duration::from_millis(250))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InstanceBusy { ref instance_id, .. } if instance_id == "web"));
        assert!(started.elapsed() >= Duration::from_millis(250));

        drop(held);
        assert!(InstanceLock::acquire("web", &path, Duration::from_millis(250))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_waiting_does_not_block_the_runtime() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".web.lock");
        let held = InstanceLock::acquire("web", &path, Duration::ZERO).await.unwrap();

        // Single-threaded runtime: the release only happens if the waiter yields.
        let release = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            drop(held);
        });
        let lock = InstanceLock::acquire("web", &path, Duration::from_secs(2))
            .await
            .unwrap();
        assert!(lock.covers("web"));
        release.await.unwrap();
    }

    #[test]
    fn test_blocking_acquire_times_out() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".web.lock");
        let _held = InstanceLock::acquire_blocking("web", &path, Duration::ZERO).unwrap();
        let err = InstanceLock::acquire_blocking("web", &path, Duration::from_millis(150)).unwrap_err();
        assert!(matches!(err, Error::InstanceBusy { .. }));
    }

    #[test]
    fn test_locks_are_per_instance() {
        let temp = TempDir::new().unwrap();
        let _a = InstanceLock::acquire_blocking("a", &temp.path().join(".a.lock"), Duration::ZERO)
            .unwrap();
        let b = InstanceLock::acquire_blocking("b", &temp.path().join(".b.lock"), Duration::ZERO)
            .unwrap();
        assert!(b.covers("b"));
        assert!(!b.covers("a"));
    }
}
