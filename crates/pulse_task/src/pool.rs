//! The worker pool: spawns one set of dedicated threads per worker type,
//! wakes idle workers on behalf of enqueuers, samples utilization, and
//! shuts the threads down cooperatively.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::executor::{IdleWorkerCounters, TaskExecutor};
use crate::priority::WorkerType;
use crate::worker::WorkerThread;

/// Errors raised while bringing a worker pool up.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// The OS refused to spawn a worker thread.
    #[error("failed to spawn {worker_type:?} worker thread: {source}")]
    Spawn {
        /// The worker type being spawned.
        worker_type: WorkerType,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },
}

/// Worker counts per type.
///
/// Defaults derive from the available core count: short-task workers get
/// most cores (their band carries the per-frame work), long-task workers
/// half, and a single file-access worker serializes I/O.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Workers servicing the frame-priority band.
    pub short_workers: usize,
    /// Workers servicing long-running background work.
    pub long_workers: usize,
    /// Workers servicing file access.
    pub file_workers: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let cores = std::thread::available_parallelism().map_or(4, |cores| cores.get());
        Self {
            short_workers: cores.saturating_sub(1).max(1),
            long_workers: (cores / 2).max(1),
            file_workers: 1,
        }
    }
}

impl PoolConfig {
    /// Number of workers configured for the given type.
    #[must_use]
    pub fn workers_for(&self, worker_type: WorkerType) -> usize {
        match worker_type {
            WorkerType::ShortTasks => self.short_workers,
            WorkerType::LongTasks => self.long_workers,
            WorkerType::FileAccess => self.file_workers,
        }
    }
}

/// A pool of dedicated worker threads, each bound to one priority band.
#[derive(Debug)]
pub struct WorkerPool {
    workers: Vec<WorkerThread>,
    counters: Arc<IdleWorkerCounters>,
}

impl WorkerPool {
    /// Spawns all configured workers against the given task system.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Spawn`] if any thread fails to start; workers
    /// spawned up to that point are shut down again before returning.
    pub fn spawn(config: &PoolConfig, executor: Arc<dyn TaskExecutor>) -> Result<Self, PoolError> {
        let counters = Arc::new(IdleWorkerCounters::new());
        let mut workers = Vec::new();

        for worker_type in WorkerType::ALL {
            for thread_number in 0..config.workers_for(worker_type) {
                let spawned = WorkerThread::spawn(
                    worker_type,
                    thread_number as u32,
                    Arc::clone(&executor),
                    Arc::clone(&counters),
                );
                match spawned {
                    Ok(worker) => workers.push(worker),
                    Err(error) => {
                        shut_down_workers(&mut workers);
                        return Err(error);
                    }
                }
            }
        }

        info!(
            short = config.short_workers,
            long = config.long_workers,
            file = config.file_workers,
            "worker pool started"
        );
        Ok(Self { workers, counters })
    }

    /// The shared idle-worker counters, for enqueuers that want to size
    /// their wake-up batches.
    #[must_use]
    pub fn idle_counters(&self) -> &Arc<IdleWorkerCounters> {
        &self.counters
    }

    /// Number of workers of the given type currently idle.
    #[must_use]
    pub fn idle_count(&self, worker_type: WorkerType) -> u32 {
        self.counters.count(worker_type)
    }

    /// Number of workers spawned for the given type.
    #[must_use]
    pub fn worker_count(&self, worker_type: WorkerType) -> usize {
        self.workers
            .iter()
            .filter(|worker| worker.worker_type() == worker_type)
            .count()
    }

    /// The pool's workers, for per-thread inspection.
    #[must_use]
    pub fn workers(&self) -> &[WorkerThread] {
        &self.workers
    }

    /// Wakes up to `count` idle workers of the given type.
    ///
    /// Called by an enqueuer after pushing work into the task system.
    /// Returns how many workers were actually woken; running workers are
    /// skipped, so this never over-signals.
    pub fn wake_workers(&self, worker_type: WorkerType, count: usize) -> usize {
        let mut woken = 0;
        for worker in &self.workers {
            if woken == count {
                break;
            }
            if worker.worker_type() == worker_type && worker.wake_up_if_idle() {
                woken += 1;
            }
        }
        woken
    }

    /// Samples and resets utilization for every worker over the given
    /// wall-clock window. Intended to be called periodically by a profiler.
    pub fn update_utilization(&self, elapsed_wall_time: Duration) {
        for worker in &self.workers {
            let utilization = worker.update_thread_utilization(elapsed_wall_time);
            debug!(
                worker = worker.worker_type().name(),
                thread = worker.thread_number(),
                utilization,
                tasks = worker.last_task_count(),
                "worker utilization sampled"
            );
        }
    }

    /// Deactivates every worker, then joins them all.
    ///
    /// Shutdown is cooperative: a worker exits after finishing its current
    /// task, so latency is bounded by the longest-running task, never by a
    /// lost wake-up.
    pub fn shutdown(mut self) {
        for worker in &self.workers {
            worker.deactivate();
        }
        for worker in &mut self.workers {
            worker.join();
        }
        info!("worker pool stopped");
    }
}

fn shut_down_workers(workers: &mut [WorkerThread]) {
    for worker in workers.iter() {
        worker.deactivate();
    }
    for worker in workers.iter_mut() {
        worker.join();
    }
}
