//! The task-system seam and the shared idle-worker accounting.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::priority::{TaskPriority, ThreadContext, WorkerType};

/// The external task system a worker pool pulls work from.
///
/// The pool knows nothing about how tasks are stored or prioritized; it only
/// asks the task system to run one ready task in the calling worker's band.
/// Implementations must be thread-safe: every worker thread calls
/// [`execute_task`](Self::execute_task) concurrently.
///
/// This seam is deliberately narrower than a full task system's execute
/// entry point, which typically also takes a blocking flag, a task-group
/// filter, and an idle out-parameter. Workers only ever poll non-blocking
/// and unfiltered, and idleness is published through
/// [`IdleWorkerCounters`] instead of being returned per call, so those
/// parameters have no representation here. A richer task system can expose
/// them on its own API and implement this trait as the non-blocking subset.
pub trait TaskExecutor: Send + Sync {
    /// Executes at most one ready task with a priority in
    /// `first_priority..=last_priority` on the calling thread.
    ///
    /// `ctx` identifies the calling worker so the task system can gate
    /// which task categories the thread may service.
    ///
    /// Returns `true` if a task was executed, `false` if none was available.
    /// Task failures are the task system's concern and must not be reported
    /// through this return value.
    fn execute_task(
        &self,
        ctx: &ThreadContext,
        first_priority: TaskPriority,
        last_priority: TaskPriority,
    ) -> bool;
}

/// Shared per-worker-type count of workers currently blocked awaiting work.
///
/// Incremented by a worker as it goes idle and decremented when it wakes;
/// enqueuers read it to decide how many workers are worth waking.
#[derive(Debug, Default)]
pub struct IdleWorkerCounters {
    counts: [AtomicU32; WorkerType::COUNT],
}

impl IdleWorkerCounters {
    /// Creates counters with all worker types at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn increment(&self, worker_type: WorkerType) {
        self.counts[worker_type.index()].fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn decrement(&self, worker_type: WorkerType) {
        let previous = self.counts[worker_type.index()].fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0, "idle counter underflow");
    }

    /// Number of workers of the given type currently idle.
    #[must_use]
    pub fn count(&self, worker_type: WorkerType) -> u32 {
        self.counts[worker_type.index()].load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_track_per_type() {
        let counters = IdleWorkerCounters::new();
        assert_eq!(counters.count(WorkerType::ShortTasks), 0);

        counters.increment(WorkerType::ShortTasks);
        counters.increment(WorkerType::ShortTasks);
        counters.increment(WorkerType::LongTasks);

        assert_eq!(counters.count(WorkerType::ShortTasks), 2);
        assert_eq!(counters.count(WorkerType::LongTasks), 1);
        assert_eq!(counters.count(WorkerType::FileAccess), 0);

        counters.decrement(WorkerType::ShortTasks);
        assert_eq!(counters.count(WorkerType::ShortTasks), 1);
    }
}
