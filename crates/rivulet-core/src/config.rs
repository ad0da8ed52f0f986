//! Task queue configuration
//!
//! The queue runs everything a reactive value defers: producer starts,
//! settlement notifications, failure notifications and subscription replays.
//! A producer that keeps rescheduling itself would make a flush spin forever,
//! so every flush is bounded by `max_tasks_per_flush`.

use serde::{Deserialize, Serialize};

/// Default upper bound on tasks executed by a single flush
pub const DEFAULT_MAX_TASKS_PER_FLUSH: usize = 100_000;

/// Configuration for a [`TaskQueue`](crate::TaskQueue)
///
/// # Example
///
/// ```
/// use rivulet_core::QueueConfig;
///
/// let config = QueueConfig::with_max_tasks_per_flush(64);
/// assert_eq!(config.max_tasks_per_flush(), 64);
///
/// // Zero is clamped to one task
/// let config = QueueConfig::with_max_tasks_per_flush(0);
/// assert_eq!(config.max_tasks_per_flush(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of tasks one `run_pending`/`run_turn` call may execute
    ///
    /// Always at least 1.
    max_tasks_per_flush: usize,
}

impl QueueConfig {
    /// Create a configuration with the given flush limit, clamped to at least 1
    pub fn with_max_tasks_per_flush(limit: usize) -> Self {
        Self {
            max_tasks_per_flush: limit.max(1),
        }
    }

    /// Get the flush limit
    pub fn max_tasks_per_flush(&self) -> usize {
        self.max_tasks_per_flush.max(1)
    }

    /// Set the flush limit, clamped to at least 1
    pub fn set_max_tasks_per_flush(&mut self, limit: usize) {
        self.max_tasks_per_flush = limit.max(1);
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_tasks_per_flush: DEFAULT_MAX_TASKS_PER_FLUSH,
        }
    }
}
