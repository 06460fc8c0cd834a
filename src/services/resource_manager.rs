//! Resource lock manager.
//!
//! Mutual exclusion over named resources (project roots, file paths) for
//! agents that may run fixers against the same tree concurrently.
//!
//! - At most one lock exists per resource name.
//! - Only the owning agent may release a lock.
//! - Locks are not reentrant: a second acquire by the owner waits like any
//!   other agent.
//! - Stale locks are reported by [`ResourceManager::get_stale_locks`] but
//!   never reclaimed here; an external supervisor decides what to do.
//!
//! The lock table sits behind one mutex. Waiters park on a [`Notify`] that
//! is signalled on every release.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::domain::errors::LockError;
use crate::domain::models::LockRecord;

/// Named-resource lock table shared between agents.
#[derive(Debug, Default)]
pub struct ResourceManager {
    locks: Mutex<HashMap<String, LockRecord>>,
    released: Notify,
}

impl ResourceManager {
    /// Empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, LockRecord>> {
        // The table is left consistent by every critical section, so a
        // poisoned mutex is still safe to use.
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the lock if it is free, without waiting.
    pub fn try_acquire(&self, resource: &str, agent_id: &str) -> bool {
        let mut table = self.table();
        if table.contains_key(resource) {
            return false;
        }
        table.insert(resource.to_string(), LockRecord::new(resource, agent_id));
        tracing::debug!(resource = resource, agent = agent_id, "Lock acquired");
        true
    }

    /// Wait for `resource` to become free and lock it for `agent_id`.
    ///
    /// Waits at most `timeout` (forever when `None`). Returns `false` on
    /// timeout; a zero timeout is a single non-blocking attempt.
    pub async fn acquire(&self, resource: &str, agent_id: &str, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            // Register interest before checking, so a release between the
            // check and the wait is not missed.
            let notified = self.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.try_acquire(resource, agent_id) {
                return true;
            }

            match deadline {
                None => notified.await,
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        tracing::debug!(
                            resource = resource,
                            agent = agent_id,
                            owner = ?self.get_owner(resource),
                            "Lock acquisition timed out"
                        );
                        return false;
                    }
                }
            }
        }
    }

    /// Release `resource`, which must be held by `agent_id`.
    pub fn release(&self, resource: &str, agent_id: &str) -> Result<(), LockError> {
        {
            let mut table = self.table();
            match table.get(resource) {
                None => return Err(LockError::NotLocked(resource.to_string())),
                Some(record) if record.owner != agent_id => {
                    return Err(LockError::NotOwner {
                        resource: resource.to_string(),
                        owner: record.owner.clone(),
                        agent: agent_id.to_string(),
                    });
                }
                Some(_) => {
                    table.remove(resource);
                }
            }
        }

        tracing::debug!(resource = resource, agent = agent_id, "Lock released");
        self.released.notify_waiters();
        Ok(())
    }

    /// Whether anyone holds `resource`.
    pub fn is_locked(&self, resource: &str) -> bool {
        self.table().contains_key(resource)
    }

    /// Agent holding `resource`, if any.
    pub fn get_owner(&self, resource: &str) -> Option<String> {
        self.table().get(resource).map(|r| r.owner.clone())
    }

    /// Snapshot of every held lock, sorted by resource name.
    pub fn held_locks(&self) -> Vec<LockRecord> {
        let mut records: Vec<LockRecord> = self.table().values().cloned().collect();
        records.sort_by(|a, b| a.resource.cmp(&b.resource));
        records
    }

    /// Resources whose lock has been held longer than `threshold`.
    ///
    /// Advisory only: nothing is released.
    pub fn get_stale_locks(&self, threshold: Duration) -> Vec<String> {
        let now = Utc::now();
        let mut stale: Vec<String> = self
            .table()
            .values()
            .filter(|r| r.is_stale_at(now, threshold))
            .map(|r| r.resource.clone())
            .collect();
        stale.sort();

        if !stale.is_empty() {
            tracing::warn!(
                count = stale.len(),
                threshold_secs = threshold.as_secs(),
                resources = ?stale,
                "Stale locks detected"
            );
        }
        stale
    }

    /// Drop every lock and wake all waiters. For test isolation and fresh
    /// process state only.
    pub fn reset(&self) {
        self.table().clear();
        self.released.notify_waiters();
    }

    /// Acquire `resource` and return a guard that releases it on drop.
    ///
    /// Fails with [`LockError::Timeout`] instead of proceeding unlocked.
    pub async fn lock(
        self: &Arc<Self>,
        resource: &str,
        agent_id: &str,
        timeout: Duration,
    ) -> Result<LockGuard, LockError> {
        if self.acquire(resource, agent_id, Some(timeout)).await {
            Ok(LockGuard {
                manager: Arc::clone(self),
                resource: resource.to_string(),
                agent_id: agent_id.to_string(),
            })
        } else {
            Err(LockError::Timeout {
                resource: resource.to_string(),
                agent: agent_id.to_string(),
                waited_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            })
        }
    }

    /// Run `work` while holding `resource`. The lock is released on every
    /// exit path, including panics unwinding through `work`.
    pub async fn with_lock<F, T>(
        self: &Arc<Self>,
        resource: &str,
        agent_id: &str,
        timeout: Duration,
        work: F,
    ) -> Result<T, LockError>
    where
        F: Future<Output = T>,
    {
        let _guard = self.lock(resource, agent_id, timeout).await?;
        Ok(work.await)
    }
}

/// Holds a lock until dropped.
#[derive(Debug)]
pub struct LockGuard {
    manager: Arc<ResourceManager>,
    resource: String,
    agent_id: String,
}

impl LockGuard {
    /// Resource the guard holds.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Agent the guard holds it for.
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(err) = self.manager.release(&self.resource, &self.agent_id) {
            // Only possible if someone reset the table underneath us.
            tracing::warn!(
                resource = %self.resource,
                agent = %self.agent_id,
                error = %err,
                "Lock guard could not release its lock"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_release_scenario() {
        let manager = ResourceManager::new();

        assert!(manager.acquire("proj", "agent1", Some(Duration::from_secs(5))).await);
        assert!(!manager.acquire("proj", "agent2", Some(Duration::from_millis(100))).await);

        manager.release("proj", "agent1").unwrap();
        assert!(manager.acquire("proj", "agent2", Some(Duration::from_secs(1))).await);
        assert_eq!(manager.get_owner("proj").as_deref(), Some("agent2"));
    }

    #[tokio::test]
    async fn test_release_by_non_owner_fails() {
        let manager = ResourceManager::new();
        assert!(manager.try_acquire("proj", "agentA"));

        let err = manager.release("proj", "agentB").unwrap_err();
        assert_eq!(
            err,
            LockError::NotOwner {
                resource: "proj".into(),
                owner: "agentA".into(),
                agent: "agentB".into(),
            }
        );
        assert_eq!(manager.get_owner("proj").as_deref(), Some("agentA"));
    }

    #[tokio::test]
    async fn test_release_unlocked_fails() {
        let manager = ResourceManager::new();
        assert_eq!(
            manager.release("nothing", "agent1"),
            Err(LockError::NotLocked("nothing".into()))
        );
    }

    #[tokio::test]
    async fn test_not_reentrant() {
        let manager = ResourceManager::new();
        assert!(manager.try_acquire("proj", "agent1"));
        assert!(!manager.acquire("proj", "agent1", Some(Duration::ZERO)).await);
    }

    #[tokio::test]
    async fn test_waiter_wakes_on_release() {
        let manager = Arc::new(ResourceManager::new());
        assert!(manager.try_acquire("proj", "agent1"));

        let waiter = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move {
                manager
                    .acquire("proj", "agent2", Some(Duration::from_secs(5)))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        manager.release("proj", "agent1").unwrap();

        assert!(waiter.await.unwrap());
        assert_eq!(manager.get_owner("proj").as_deref(), Some("agent2"));
    }

    #[tokio::test]
    async fn test_guard_releases_on_drop() {
        let manager = Arc::new(ResourceManager::new());
        {
            let guard = manager
                .lock("proj", "agent1", Duration::from_secs(1))
                .await
                .unwrap();
            assert_eq!(guard.resource(), "proj");
            assert!(manager.is_locked("proj"));
        }
        assert!(!manager.is_locked("proj"));
    }

    #[tokio::test]
    async fn test_guard_times_out_with_error() {
        let manager = Arc::new(ResourceManager::new());
        assert!(manager.try_acquire("proj", "agent1"));

        let err = manager
            .lock("proj", "agent2", Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::Timeout { .. }));
        assert_eq!(manager.get_owner("proj").as_deref(), Some("agent1"));
    }

    #[tokio::test]
    async fn test_with_lock_runs_work_and_releases() {
        let manager = Arc::new(ResourceManager::new());
        let value = manager
            .with_lock("proj", "agent1", Duration::from_secs(1), async { 42 })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert!(!manager.is_locked("proj"));
    }

    #[tokio::test]
    async fn test_stale_locks_reported_not_released() {
        let manager = ResourceManager::new();
        assert!(manager.try_acquire("old", "agent1"));
        assert!(manager.try_acquire("new", "agent2"));
        manager
            .table()
            .get_mut("old")
            .unwrap()
            .acquired_at -= chrono::Duration::seconds(3600);

        assert_eq!(manager.get_stale_locks(Duration::from_secs(60)), vec!["old".to_string()]);
        assert!(manager.is_locked("old"));
    }

    #[tokio::test]
    async fn test_reset_clears_table() {
        let manager = ResourceManager::new();
        assert!(manager.try_acquire("a", "agent1"));
        assert!(manager.try_acquire("b", "agent1"));
        assert_eq!(manager.held_locks().len(), 2);

        manager.reset();
        assert!(manager.held_locks().is_empty());
    }
}
