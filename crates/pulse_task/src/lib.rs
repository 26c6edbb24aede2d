//! # pulse_task
//!
//! Cooperative worker-thread task executor.
//!
//! A [`WorkerPool`] runs a small number of dedicated OS threads, each bound
//! at creation to one priority band (its [`WorkerType`]). Workers greedily
//! pull ready tasks from an external task system through the
//! [`TaskExecutor`] trait; when no task is available they block on a private
//! wake signal and mark themselves in a shared per-worker-type idle counter,
//! so an enqueuer can wake exactly as many workers as it has new work for.
//! Shutdown is cooperative: workers check their active flag between tasks.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use pulse_task::{PoolConfig, TaskExecutor, TaskPriority, ThreadContext, WorkerPool, WorkerType};
//!
//! struct MyTaskSystem;
//!
//! impl TaskExecutor for MyTaskSystem {
//!     fn execute_task(
//!         &self,
//!         _ctx: &ThreadContext,
//!         _first_priority: TaskPriority,
//!         _last_priority: TaskPriority,
//!     ) -> bool {
//!         false // no task available
//!     }
//! }
//!
//! let pool = WorkerPool::spawn(&PoolConfig::default(), Arc::new(MyTaskSystem)).unwrap();
//! // ... enqueue work, then:
//! pool.wake_workers(WorkerType::ShortTasks, 1);
//! pool.update_utilization(Duration::from_secs(1));
//! pool.shutdown();
//! ```

pub mod executor;
pub mod pool;
pub mod priority;
mod signal;
pub mod worker;

pub use executor::{IdleWorkerCounters, TaskExecutor};
pub use pool::{PoolConfig, PoolError, WorkerPool};
pub use priority::{TaskPriority, ThreadContext, WorkerType};
pub use worker::WorkerThread;
