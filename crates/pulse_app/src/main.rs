//! # pulse_app — scheduler + worker pool demo
//!
//! Drives an [`IntervalScheduler`] from a fixed-timestep tick loop and feeds
//! the due work into a [`WorkerPool`] through a FIFO task queue:
//!
//! 1. Register a handful of periodic jobs at different cadences.
//! 2. Each tick: `scheduler.update` enqueues a task per due job.
//! 3. Wake as many idle workers (per band) as tasks were enqueued.
//! 4. Once a second: sample per-worker utilization and log tick stats.

mod queue;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use tracing::{info, trace, warn};
use tracing_subscriber::EnvFilter;

use pulse_schedule::{IntervalScheduler, WorkId};
use pulse_task::{PoolConfig, TaskExecutor, TaskPriority, WorkerPool, WorkerType};

use queue::FifoTaskQueue;

#[derive(Parser, Debug)]
#[command(about = "Interval scheduler and worker pool demo")]
struct Args {
    /// Target ticks per second.
    #[arg(long, default_value_t = 60.0)]
    tick_rate: f64,

    /// How long to run, in seconds.
    #[arg(long, default_value_t = 3)]
    run_seconds: u64,

    /// Override the number of short-task workers.
    #[arg(long)]
    short_workers: Option<usize>,

    /// Override the number of long-task workers.
    #[arg(long)]
    long_workers: Option<usize>,
}

/// A demo periodic job: counts its own executions on the worker threads.
struct Job {
    name: &'static str,
    priority: TaskPriority,
    runs: Arc<AtomicU64>,
}

fn demo_jobs() -> HashMap<WorkId, (Job, Duration)> {
    let job = |name, priority| Job {
        name,
        priority,
        runs: Arc::new(AtomicU64::new(0)),
    };
    HashMap::from([
        (
            WorkId::from_raw(1),
            (
                job("animation", TaskPriority::ThisFrame),
                Duration::from_millis(16),
            ),
        ),
        (
            WorkId::from_raw(2),
            (job("ai", TaskPriority::ThisFrame), Duration::from_millis(33)),
        ),
        (
            WorkId::from_raw(3),
            (
                job("pathfinding", TaskPriority::LateThisFrame),
                Duration::from_millis(100),
            ),
        ),
        (
            WorkId::from_raw(4),
            (
                job("autosave", TaskPriority::LongRunning),
                Duration::from_millis(500),
            ),
        ),
    ])
}

fn main() -> Result<()> {
    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("pulse_app=info".parse()?))
        .init();

    let args = Args::parse();

    let mut pool_config = PoolConfig::default();
    if let Some(short_workers) = args.short_workers {
        pool_config.short_workers = short_workers;
    }
    if let Some(long_workers) = args.long_workers {
        pool_config.long_workers = long_workers;
    }

    let task_queue = Arc::new(FifoTaskQueue::new());
    let pool = WorkerPool::spawn(
        &pool_config,
        Arc::clone(&task_queue) as Arc<dyn TaskExecutor>,
    )?;

    let mut scheduler = IntervalScheduler::<WorkId>::new();
    let jobs = demo_jobs();
    for (&work, (job, interval)) in &jobs {
        scheduler.add_or_update_work(work, *interval);
        info!(job = job.name, interval_ms = interval.as_millis() as u64, "registered job");
    }

    let tick_duration = Duration::from_secs_f64(1.0 / args.tick_rate);
    let total_ticks = (args.run_seconds as f64 * args.tick_rate).ceil() as u64;
    info!(
        tick_rate = args.tick_rate,
        ticks = total_ticks,
        "starting tick loop"
    );

    let mut last_sample = Instant::now();
    for tick in 1..=total_ticks {
        let start = Instant::now();

        let mut wakes = [0usize; WorkerType::COUNT];
        scheduler.update(tick_duration, |_, work, elapsed| {
            let Some((job, _)) = jobs.get(&work) else {
                return;
            };
            let runs = Arc::clone(&job.runs);
            let name = job.name;
            task_queue.enqueue(
                job.priority,
                Box::new(move || {
                    runs.fetch_add(1, Ordering::Relaxed);
                    trace!(job = name, "job task ran");
                }),
            );
            trace!(
                job = job.name,
                elapsed_ms = elapsed.as_millis() as u64,
                "job due"
            );
            wakes[WorkerType::for_priority(job.priority).index()] += 1;
        });

        for worker_type in WorkerType::ALL {
            let count = wakes[worker_type.index()];
            if count > 0 {
                pool.wake_workers(worker_type, count);
            }
        }

        if last_sample.elapsed() >= Duration::from_secs(1) {
            pool.update_utilization(last_sample.elapsed());
            last_sample = Instant::now();
            info!(
                tick,
                expected_per_tick = scheduler.expected_work_per_tick(),
                pending = task_queue.pending(),
                executed = task_queue.executed(),
                "tick stats"
            );
        }

        let elapsed = start.elapsed();
        if elapsed < tick_duration {
            std::thread::sleep(tick_duration - elapsed);
        } else {
            warn!(
                tick,
                elapsed_ms = elapsed.as_millis() as u64,
                budget_ms = tick_duration.as_millis() as u64,
                "tick exceeded time budget"
            );
        }
    }

    // Let in-flight tasks drain before the final tally.
    while task_queue.pending() > 0 {
        for worker_type in WorkerType::ALL {
            pool.wake_workers(worker_type, 1);
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    pool.shutdown();

    for (job, interval) in jobs.values() {
        info!(
            job = job.name,
            interval_ms = interval.as_millis() as u64,
            runs = job.runs.load(Ordering::Relaxed),
            "job totals"
        );
    }
    info!(executed = task_queue.executed(), "simulation complete");
    Ok(())
}
