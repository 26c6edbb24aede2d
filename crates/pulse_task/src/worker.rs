//! Worker thread: the per-thread task execution loop with idle accounting,
//! wake signaling, cooperative cancellation, and utilization tracking.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::executor::{IdleWorkerCounters, TaskExecutor};
use crate::pool::PoolError;
use crate::priority::{ThreadContext, WorkerType};
use crate::signal::WakeSignal;

/// Active-time bookkeeping, touched by the worker thread itself and by the
/// utilization sampler.
#[derive(Debug)]
struct Timing {
    /// Start of the current active window; meaningful while `executing`.
    started_working_at: Instant,
    /// Active time folded in since the last utilization sample.
    accumulated_active: Duration,
    /// True from wake-up until the worker goes idle again.
    executing: bool,
}

/// State shared between a worker's OS thread and its [`WorkerThread`] handle.
#[derive(Debug)]
struct Shared {
    worker_type: WorkerType,
    thread_number: u32,
    /// Cleared by `deactivate`; checked by the loop between tasks.
    active: AtomicBool,
    /// Set while the worker is blocked (or about to block) awaiting work.
    /// Cleared atomically by whoever wakes the worker.
    idle: AtomicBool,
    /// Set once the run loop has exited.
    finished: AtomicBool,
    signal: WakeSignal,
    timing: Mutex<Timing>,
    /// Tasks executed since the last utilization sample.
    tasks_executed: AtomicU32,
    /// Bit pattern of the last computed utilization `f64`.
    last_utilization: AtomicU64,
    /// Task count snapshot taken at the last utilization sample.
    last_task_count: AtomicU32,
}

impl Shared {
    fn new(worker_type: WorkerType, thread_number: u32) -> Self {
        Self {
            worker_type,
            thread_number,
            active: AtomicBool::new(true),
            idle: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            signal: WakeSignal::new(),
            timing: Mutex::new(Timing {
                started_working_at: Instant::now(),
                accumulated_active: Duration::ZERO,
                executing: false,
            }),
            tasks_executed: AtomicU32::new(0),
            last_utilization: AtomicU64::new(0.0f64.to_bits()),
            last_task_count: AtomicU32::new(0),
        }
    }

    fn lock_timing(&self) -> std::sync::MutexGuard<'_, Timing> {
        self.timing.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks the worker active and rebases its active-time clock.
    fn begin_active_window(&self) {
        let mut timing = self.lock_timing();
        timing.executing = true;
        timing.started_working_at = Instant::now();
    }

    /// Folds the current active window into the accumulator.
    fn end_active_window(&self) {
        let mut timing = self.lock_timing();
        if timing.executing {
            let window = timing.started_working_at.elapsed();
            timing.accumulated_active += window;
            timing.executing = false;
        }
    }

    /// Atomically test-and-clear the idle flag; on success raise the wake
    /// signal. Returns whether this call was the one that woke the worker.
    fn wake_up_if_idle(&self) -> bool {
        if self
            .idle
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.signal.raise();
            true
        } else {
            false
        }
    }

    /// Blocks until woken. By the time this returns the idle flag has
    /// already been cleared by whoever raised the signal.
    fn wait_for_work(&self, counters: &IdleWorkerCounters) {
        self.end_active_window();
        counters.increment(self.worker_type);
        self.idle.store(true, Ordering::SeqCst);

        // Deactivation may have raced with publishing the idle flag. If
        // shutdown began and nobody has claimed the flag yet, retract it
        // and return instead of blocking on a wake that will never come.
        if !self.active.load(Ordering::SeqCst)
            && self
                .idle
                .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            counters.decrement(self.worker_type);
            self.begin_active_window();
            return;
        }

        self.signal.wait();
        counters.decrement(self.worker_type);
        self.begin_active_window();
    }
}

/// The worker's thread entry point: greedily drain tasks in the assigned
/// priority band, sleep when none are available, exit when deactivated.
fn run(shared: &Shared, executor: &dyn TaskExecutor, counters: &IdleWorkerCounters) {
    let ctx = ThreadContext::new(shared.worker_type, shared.thread_number);
    let (first_priority, last_priority) = ctx.priority_range();

    debug!(
        worker = shared.worker_type.name(),
        thread = shared.thread_number,
        "worker thread started"
    );

    shared.begin_active_window();
    while shared.active.load(Ordering::SeqCst) {
        if executor.execute_task(&ctx, first_priority, last_priority) {
            shared.tasks_executed.fetch_add(1, Ordering::Relaxed);
        } else {
            shared.wait_for_work(counters);
        }
    }
    shared.end_active_window();
    shared.finished.store(true, Ordering::SeqCst);

    debug!(
        worker = shared.worker_type.name(),
        thread = shared.thread_number,
        "worker thread exiting"
    );
}

/// Handle to one dedicated worker thread.
///
/// Spawned by [`WorkerPool`](crate::pool::WorkerPool); exposed so callers
/// can wake, deactivate, and sample individual workers.
#[derive(Debug)]
pub struct WorkerThread {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl WorkerThread {
    /// Spawns a named OS thread running the worker loop against `executor`.
    pub fn spawn(
        worker_type: WorkerType,
        thread_number: u32,
        executor: Arc<dyn TaskExecutor>,
        counters: Arc<IdleWorkerCounters>,
    ) -> Result<Self, PoolError> {
        let shared = Arc::new(Shared::new(worker_type, thread_number));
        let thread_shared = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name(format!("{}{}", worker_type.name(), thread_number))
            .spawn(move || run(&thread_shared, executor.as_ref(), &counters))
            .map_err(|source| PoolError::Spawn {
                worker_type,
                source,
            })?;
        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    /// The priority band this worker services.
    #[must_use]
    pub fn worker_type(&self) -> WorkerType {
        self.shared.worker_type
    }

    /// Index of this worker within its type.
    #[must_use]
    pub fn thread_number(&self) -> u32 {
        self.shared.thread_number
    }

    /// Returns `true` if the worker's run loop has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.shared.finished.load(Ordering::SeqCst)
    }

    /// If the worker is idle, atomically claim its idle flag and wake it.
    ///
    /// Returns `true` if this call woke the worker, `false` if it was not
    /// idle — letting an enqueuer go on to wake a *different* idle worker
    /// instead of redundantly signaling a running one.
    pub fn wake_up_if_idle(&self) -> bool {
        self.shared.wake_up_if_idle()
    }

    /// Requests cooperative shutdown.
    ///
    /// Returns `true` if the worker had already finished. Returns `false`
    /// if the thread is still running (it has been woken if it was idle and
    /// will exit after its current task); the caller must still join.
    pub fn deactivate(&self) -> bool {
        self.shared.active.store(false, Ordering::SeqCst);
        if self.shared.finished.load(Ordering::SeqCst) {
            return true;
        }
        self.shared.wake_up_if_idle();
        false
    }

    /// Joins the worker's OS thread.
    ///
    /// # Panics
    ///
    /// Panics on a double join or if the worker thread panicked — both
    /// programmer errors, not runtime conditions.
    pub fn join(&mut self) {
        let handle = self.handle.take().expect("worker thread joined twice");
        handle.join().expect("worker thread panicked");
    }

    /// Samples and resets this worker's utilization over `elapsed_wall_time`.
    ///
    /// If a task is in flight the window up to now is folded in first and
    /// the clock rebased, so the next sample does not double-count. The
    /// result is clamped to `[0, 1]` and stored for
    /// [`last_utilization`](Self::last_utilization); the task counter is
    /// snapshotted into [`last_task_count`](Self::last_task_count) and reset.
    pub fn update_thread_utilization(&self, elapsed_wall_time: Duration) -> f64 {
        let active = {
            let mut timing = self.shared.lock_timing();
            if timing.executing {
                let now = Instant::now();
                let window = now - timing.started_working_at;
                timing.accumulated_active += window;
                timing.started_working_at = now;
            }
            std::mem::take(&mut timing.accumulated_active)
        };

        let utilization = if elapsed_wall_time.is_zero() {
            0.0
        } else {
            (active.as_secs_f64() / elapsed_wall_time.as_secs_f64()).clamp(0.0, 1.0)
        };
        self.shared
            .last_utilization
            .store(utilization.to_bits(), Ordering::Relaxed);

        let executed = self.shared.tasks_executed.swap(0, Ordering::Relaxed);
        self.shared.last_task_count.store(executed, Ordering::Relaxed);

        utilization
    }

    /// Utilization computed by the last
    /// [`update_thread_utilization`](Self::update_thread_utilization) call.
    #[must_use]
    pub fn last_utilization(&self) -> f64 {
        f64::from_bits(self.shared.last_utilization.load(Ordering::Relaxed))
    }

    /// Tasks executed in the window ending at the last utilization sample.
    #[must_use]
    pub fn last_task_count(&self) -> u32 {
        self.shared.last_task_count.load(Ordering::Relaxed)
    }
}
