//! Task priorities, worker types, and the per-thread execution context.
//!
//! A worker type is an identity plus a contiguous priority range: it
//! determines which task categories a worker thread may execute. The range
//! is carried in an explicit [`ThreadContext`] handed to the task system on
//! every call, rather than ambient thread-local state, so both sides stay
//! unit-testable without real threads.

/// Priority category of a task, from most to least urgent.
///
/// Frame priorities are serviced by short-task workers; long-running and
/// file-access priorities each have their own dedicated band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskPriority {
    /// Finish as early as possible in the current frame.
    EarlyThisFrame,
    /// Finish within the current frame.
    ThisFrame,
    /// Finish within the current frame, after everything more urgent.
    LateThisFrame,
    /// Start this frame if there is spare time, finish next frame.
    EarlyNextFrame,
    /// Finish within the next frame.
    NextFrame,
    /// Finish within the next frame, after everything more urgent.
    LateNextFrame,
    /// Long-running work that should still start promptly.
    LongRunningHighPriority,
    /// Long-running background work.
    LongRunning,
    /// Urgent file access.
    FileAccessHighPriority,
    /// Regular file access.
    FileAccess,
}

impl TaskPriority {
    /// Number of priority categories.
    pub const COUNT: usize = 10;

    /// All priorities in declaration (descending-urgency) order.
    pub const ALL: [TaskPriority; Self::COUNT] = [
        TaskPriority::EarlyThisFrame,
        TaskPriority::ThisFrame,
        TaskPriority::LateThisFrame,
        TaskPriority::EarlyNextFrame,
        TaskPriority::NextFrame,
        TaskPriority::LateNextFrame,
        TaskPriority::LongRunningHighPriority,
        TaskPriority::LongRunning,
        TaskPriority::FileAccessHighPriority,
        TaskPriority::FileAccess,
    ];

    /// Index of this priority in [`TaskPriority::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Iterates the inclusive priority span `first..=last`, most urgent first.
    pub fn span(
        first: TaskPriority,
        last: TaskPriority,
    ) -> impl Iterator<Item = TaskPriority> {
        debug_assert!(first <= last);
        let all: &'static [TaskPriority] = &Self::ALL;
        all[first.index()..=last.index()].iter().copied()
    }
}

/// The kind of worker thread, determining which priority band it services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerType {
    /// Services the frame priorities; tasks must be short.
    ShortTasks,
    /// Services long-running background work.
    LongTasks,
    /// Services file access; one worker serializes I/O by default.
    FileAccess,
}

impl WorkerType {
    /// Number of worker types.
    pub const COUNT: usize = 3;

    /// All worker types.
    pub const ALL: [WorkerType; Self::COUNT] = [
        WorkerType::ShortTasks,
        WorkerType::LongTasks,
        WorkerType::FileAccess,
    ];

    /// Index of this worker type, usable for per-type counters.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Thread-name prefix for workers of this type.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            WorkerType::ShortTasks => "ShortTasks",
            WorkerType::LongTasks => "LongTasks",
            WorkerType::FileAccess => "FileAccess",
        }
    }

    /// The worker type whose band services the given priority.
    #[must_use]
    pub const fn for_priority(priority: TaskPriority) -> WorkerType {
        match priority {
            TaskPriority::EarlyThisFrame
            | TaskPriority::ThisFrame
            | TaskPriority::LateThisFrame
            | TaskPriority::EarlyNextFrame
            | TaskPriority::NextFrame
            | TaskPriority::LateNextFrame => WorkerType::ShortTasks,
            TaskPriority::LongRunningHighPriority | TaskPriority::LongRunning => {
                WorkerType::LongTasks
            }
            TaskPriority::FileAccessHighPriority | TaskPriority::FileAccess => {
                WorkerType::FileAccess
            }
        }
    }

    /// The contiguous priority band this worker type services.
    #[must_use]
    pub const fn priority_range(self) -> (TaskPriority, TaskPriority) {
        match self {
            WorkerType::ShortTasks => {
                (TaskPriority::EarlyThisFrame, TaskPriority::LateNextFrame)
            }
            WorkerType::LongTasks => {
                (TaskPriority::LongRunningHighPriority, TaskPriority::LongRunning)
            }
            WorkerType::FileAccess => {
                (TaskPriority::FileAccessHighPriority, TaskPriority::FileAccess)
            }
        }
    }
}

/// Identity of the calling worker thread, passed explicitly to the task
/// system so it can gate which task categories the thread may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadContext {
    /// The worker's priority band.
    pub worker_type: WorkerType,
    /// Index of this worker within its type.
    pub thread_number: u32,
}

impl ThreadContext {
    /// Create a context for one worker thread.
    #[must_use]
    pub const fn new(worker_type: WorkerType, thread_number: u32) -> Self {
        Self {
            worker_type,
            thread_number,
        }
    }

    /// The priority band the owning thread services.
    #[must_use]
    pub const fn priority_range(&self) -> (TaskPriority, TaskPriority) {
        self.worker_type.priority_range()
    }
}
