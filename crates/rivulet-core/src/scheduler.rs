//! Deferred task execution
//!
//! Reactive values never run producers or notify handlers inline. Everything
//! is pushed onto a [`Scheduler`] and runs on a later turn. [`TaskQueue`] is
//! the deterministic, single-threaded implementation: callers drive it
//! explicitly with [`TaskQueue::run_pending`] or [`TaskQueue::run_turn`].

use crate::{Error, QueueConfig, Result};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use tracing::trace;

/// A deferred unit of work
pub type Task = Box<dyn FnOnce()>;

/// Shared handle to a scheduler, as held by reactive values
pub type SchedulerRef = Rc<dyn Scheduler>;

/// Identifier of a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    /// Get the raw ID value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task:{}", self.0)
    }
}

/// Queue that defers work to a later turn
///
/// Tasks must run in the order they were scheduled. Reactive values rely on
/// this to deliver settlements in order.
pub trait Scheduler {
    /// Enqueue a task. The task must not run before this call returns.
    fn schedule(&self, task: Task) -> TaskId;

    /// Drop a task that has not run yet
    ///
    /// Returns false when the task already ran, was already canceled, or is
    /// unknown.
    fn cancel(&self, id: TaskId) -> bool;
}

/// Counters describing queue activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Tasks ever scheduled
    pub scheduled: u64,
    /// Tasks that ran
    pub executed: u64,
    /// Tasks dropped before running
    pub canceled: u64,
}

struct QueueState {
    next_id: u64,
    pending: VecDeque<(TaskId, Task)>,
    stats: QueueStats,
}

/// FIFO task queue driven by the caller
///
/// # Example
///
/// ```
/// use rivulet_core::{Scheduler, TaskQueue};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let queue = TaskQueue::new();
/// let ran = Rc::new(Cell::new(false));
/// let flag = ran.clone();
/// queue.schedule(Box::new(move || flag.set(true)));
///
/// assert!(!ran.get());
/// queue.run_pending().unwrap();
/// assert!(ran.get());
/// ```
pub struct TaskQueue {
    config: QueueConfig,
    state: RefCell<QueueState>,
}

impl TaskQueue {
    /// Create a queue with the default configuration
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    /// Create a queue with the given configuration
    pub fn with_config(config: QueueConfig) -> Self {
        Self {
            config,
            state: RefCell::new(QueueState {
                next_id: 0,
                pending: VecDeque::new(),
                stats: QueueStats::default(),
            }),
        }
    }

    /// Get the queue configuration
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Number of tasks waiting to run
    pub fn len(&self) -> usize {
        self.state.borrow().pending.len()
    }

    /// Check if no task is waiting
    pub fn is_empty(&self) -> bool {
        self.state.borrow().pending.is_empty()
    }

    /// Get activity counters
    pub fn stats(&self) -> QueueStats {
        self.state.borrow().stats
    }

    /// Run tasks until the queue is empty, including tasks scheduled while
    /// running
    ///
    /// Returns the number of tasks executed.
    pub fn run_pending(&self) -> Result<usize> {
        self.flush(None)
    }

    /// Run only the tasks that were queued before this call
    ///
    /// Tasks scheduled while the turn runs are left for the next turn.
    pub fn run_turn(&self) -> Result<usize> {
        let watermark = TaskId(self.state.borrow().next_id);
        self.flush(Some(watermark))
    }

    fn flush(&self, watermark: Option<TaskId>) -> Result<usize> {
        let limit = self.config.max_tasks_per_flush();
        let mut executed = 0;
        while let Some(task) = self.pop(watermark) {
            if executed == limit {
                // Put it back untouched; the next flush starts with it.
                self.state.borrow_mut().pending.push_front(task);
                return Err(Error::FlushLimitExceeded { limit });
            }
            let (id, run) = task;
            trace!(task = %id, "running task");
            run();
            executed += 1;
            self.state.borrow_mut().stats.executed += 1;
        }
        Ok(executed)
    }

    fn pop(&self, watermark: Option<TaskId>) -> Option<(TaskId, Task)> {
        let mut state = self.state.borrow_mut();
        match (state.pending.front(), watermark) {
            (Some((id, _)), Some(mark)) if *id >= mark => None,
            (Some(_), _) => state.pending.pop_front(),
            (None, _) => None,
        }
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("config", &self.config)
            .field("pending", &self.len())
            .finish()
    }
}

impl Scheduler for TaskQueue {
    fn schedule(&self, task: Task) -> TaskId {
        let mut state = self.state.borrow_mut();
        let id = TaskId(state.next_id);
        state.next_id += 1;
        state.stats.scheduled += 1;
        state.pending.push_back((id, task));
        id
    }

    fn cancel(&self, id: TaskId) -> bool {
        let removed = {
            let mut state = self.state.borrow_mut();
            let removed = state
                .pending
                .iter()
                .position(|(pending, _)| *pending == id)
                .and_then(|index| state.pending.remove(index));
            if removed.is_some() {
                state.stats.canceled += 1;
            }
            removed
        };
        // Dropping a task may drop the last handle of a reactive value, whose
        // teardown uses this queue.
        removed.is_some()
    }
}
