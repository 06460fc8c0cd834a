//! Resource lock record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A held lock over a named resource (usually a project or file path).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Locked resource name.
    pub resource: String,
    /// Agent holding the lock.
    pub owner: String,
    /// When the lock was taken.
    pub acquired_at: DateTime<Utc>,
}

impl LockRecord {
    /// Record acquired now.
    pub fn new(resource: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            owner: owner.into(),
            acquired_at: Utc::now(),
        }
    }

    /// How long the lock has been held as of `now`.
    ///
    /// Negative ages (clock moved backwards) are reported as zero.
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        (now - self.acquired_at).to_std().unwrap_or_default()
    }

    /// True when the lock has been held strictly longer than `threshold`.
    pub fn is_stale_at(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.age_at(now) > threshold
    }
}
