//! Cross-process project lock.
//!
//! The resource manager only coordinates agents inside one process. Separate
//! `texguard` processes fixing the same directory coordinate through an
//! exclusive lock file at `<root>/.texguard/fix.lock`, created with
//! `create_new` so exactly one process can hold it. The file records the
//! owning agent; it is removed when the holder drops its [`ProjectLock`].
//!
//! A lock file left behind by a crashed process is reported, never removed
//! by another process.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;

use super::config::CONFIG_DIR;
use crate::domain::errors::{DomainError, DomainResult, LockError};
use crate::domain::models::LockRecord;

/// File name of the lock inside the project's config directory.
pub const LOCK_FILE: &str = "fix.lock";

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// An exclusive lock over a project directory, held until dropped.
#[derive(Debug)]
pub struct ProjectLock {
    path: PathBuf,
    record: LockRecord,
}

impl ProjectLock {
    /// Location of the lock file for `root`.
    pub fn path_for(root: &Path) -> PathBuf {
        root.join(CONFIG_DIR).join(LOCK_FILE)
    }

    /// Take the lock if no other process holds it.
    ///
    /// Returns `Ok(None)` when the lock file already exists.
    pub async fn try_acquire(root: &Path, agent_id: &str) -> DomainResult<Option<Self>> {
        let path = Self::path_for(root);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| io_error(parent, source))?;
        }

        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(None),
            Err(source) => return Err(io_error(&path, source)),
        };

        let record = LockRecord::new(root.display().to_string(), agent_id);
        // From here on the file is ours; dropping `lock` removes it on failure.
        let lock = Self { path, record };
        let body = serde_json::to_vec(&lock.record)?;
        file.write_all(&body)
            .await
            .map_err(|source| io_error(&lock.path, source))?;
        file.flush()
            .await
            .map_err(|source| io_error(&lock.path, source))?;

        tracing::debug!(path = %lock.path.display(), agent = agent_id, "Project lock acquired");
        Ok(Some(lock))
    }

    /// Take the lock, polling until `timeout` elapses.
    ///
    /// A zero timeout tries exactly once.
    pub async fn acquire(root: &Path, agent_id: &str, timeout: Duration) -> DomainResult<Self> {
        let start = Instant::now();
        loop {
            if let Some(lock) = Self::try_acquire(root, agent_id).await? {
                return Ok(lock);
            }
            if start.elapsed() >= timeout {
                break;
            }
            tokio::time::sleep(POLL_INTERVAL.min(timeout.saturating_sub(start.elapsed()))).await;
        }

        let path = Self::path_for(root);
        match Self::holder(root).await {
            Ok(Some(holder)) => tracing::warn!(
                path = %path.display(),
                owner = %holder.owner,
                held_secs = holder.age_at(chrono::Utc::now()).as_secs(),
                "Project is locked by another process"
            ),
            _ => tracing::warn!(path = %path.display(), "Project is locked by another process"),
        }

        Err(LockError::Timeout {
            resource: path.display().to_string(),
            agent: agent_id.to_string(),
            waited_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
        .into())
    }

    /// The record of whoever holds the lock on `root`, if anyone.
    pub async fn holder(root: &Path) -> DomainResult<Option<LockRecord>> {
        let path = Self::path_for(root);
        match tokio::fs::read(&path).await {
            Ok(body) => Ok(Some(serde_json::from_slice(&body)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(io_error(&path, source)),
        }
    }

    /// Path of the held lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record written to the lock file.
    pub fn record(&self) -> &LockRecord {
        &self.record
    }
}

impl Drop for ProjectLock {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Project lock released"),
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove project lock file"
            ),
        }
    }
}

fn io_error(path: &Path, source: std::io::Error) -> DomainError {
    DomainError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_second_holder_times_out() {
        let dir = TempDir::new().unwrap();
        let first = ProjectLock::acquire(dir.path(), "agent-1", Duration::ZERO)
            .await
            .unwrap();
        assert!(ProjectLock::path_for(dir.path()).is_file());

        let err = ProjectLock::acquire(dir.path(), "agent-2", Duration::from_millis(150))
            .await
            .unwrap_err();
        match err {
            DomainError::Lock(LockError::Timeout { agent, waited_ms, .. }) => {
                assert_eq!(agent, "agent-2");
                assert!(waited_ms >= 150);
            }
            other => panic!("Expected lock timeout, got {other:?}"),
        }

        let holder = ProjectLock::holder(dir.path()).await.unwrap().unwrap();
        assert_eq!(holder.owner, "agent-1");
        assert_eq!(holder, *first.record());
    }

    #[tokio::test]
    async fn test_drop_releases_for_next_holder() {
        let dir = TempDir::new().unwrap();
        let first = ProjectLock::try_acquire(dir.path(), "agent-1").await.unwrap();
        assert!(first.is_some());
        assert!(ProjectLock::try_acquire(dir.path(), "agent-2").await.unwrap().is_none());

        drop(first);
        assert!(!ProjectLock::path_for(dir.path()).exists());
        assert!(ProjectLock::holder(dir.path()).await.unwrap().is_none());

        let second = ProjectLock::try_acquire(dir.path(), "agent-2").await.unwrap();
        assert_eq!(second.unwrap().record().owner, "agent-2");
    }

    #[tokio::test]
    async fn test_waiter_acquires_once_holder_drops() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        let first = ProjectLock::acquire(&root, "agent-1", Duration::ZERO).await.unwrap();

        let waiter = tokio::spawn(async move {
            ProjectLock::acquire(&root, "agent-2", Duration::from_secs(5))
                .await
                .map(|lock| lock.record().owner.clone())
        });
        tokio::time::sleep(Duration::from_millis(150)).await;
        drop(first);

        assert_eq!(waiter.await.unwrap().unwrap(), "agent-2");
    }

    #[tokio::test]
    async fn test_corrupt_lock_file_is_serialization_error() {
        let dir = TempDir::new().unwrap();
        let path = ProjectLock::path_for(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json").unwrap();

        let err = ProjectLock::holder(dir.path()).await.unwrap_err();
        assert!(matches!(err, DomainError::SerializationError(_)));
        assert!(ProjectLock::try_acquire(dir.path(), "agent-1").await.unwrap().is_none());
    }
}
