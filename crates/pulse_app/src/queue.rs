//! A minimal FIFO task system backing the worker pool.
//!
//! One queue per priority; workers scan their band most-urgent-first and
//! pop one task per call. This stands in for the engine's full task system,
//! which additionally tracks groups and dependencies.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use pulse_task::{TaskExecutor, TaskPriority, ThreadContext};

/// A unit of work: runs once on whichever worker picks it up.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Per-priority FIFO queues implementing [`TaskExecutor`].
pub struct FifoTaskQueue {
    queues: [Mutex<VecDeque<Task>>; TaskPriority::COUNT],
    executed: AtomicU64,
}

impl std::fmt::Debug for FifoTaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FifoTaskQueue")
            .field("pending", &self.pending())
            .field("executed", &self.executed())
            .finish()
    }
}

impl Default for FifoTaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl FifoTaskQueue {
    /// Creates an empty queue set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            queues: std::array::from_fn(|_| Mutex::new(VecDeque::new())),
            executed: AtomicU64::new(0),
        }
    }

    /// Enqueues a task at the given priority. The caller is responsible for
    /// waking a worker of the matching type afterwards.
    pub fn enqueue(&self, priority: TaskPriority, task: Task) {
        self.queues[priority.index()]
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push_back(task);
    }

    /// Total number of tasks waiting across all priorities.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queues
            .iter()
            .map(|queue| {
                queue
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .len()
            })
            .sum()
    }

    /// Total number of tasks executed since creation.
    #[must_use]
    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }
}

impl TaskExecutor for FifoTaskQueue {
    fn execute_task(
        &self,
        _ctx: &ThreadContext,
        first_priority: TaskPriority,
        last_priority: TaskPriority,
    ) -> bool {
        for priority in TaskPriority::span(first_priority, last_priority) {
            let task = self.queues[priority.index()]
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .pop_front();
            if let Some(task) = task {
                task();
                self.executed.fetch_add(1, Ordering::Relaxed);
                return true;
            }
        }
        false
    }
}
