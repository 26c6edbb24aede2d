//! # pulse_schedule
//!
//! Recurring-work interval scheduler for the simulation tick.
//!
//! A large, dynamic set of periodic update callbacks — each with its own
//! desired frequency — is registered with an [`IntervalScheduler`]. Once per
//! tick the owner calls [`IntervalScheduler::update`], which decides which
//! items are due, invokes a caller-supplied callback for each, and
//! reschedules them. Initial phases are randomized so that items sharing an
//! interval do not all fire on the same tick; after a large time jump (e.g. a
//! debugger pause) missed periods are coalesced into a single invocation
//! instead of being replayed.
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//! use pulse_schedule::{IntervalScheduler, WorkId};
//!
//! let mut scheduler = IntervalScheduler::<WorkId>::new();
//! scheduler.add_or_update_work(WorkId::from_raw(1), Duration::from_millis(10));
//!
//! scheduler.update(Duration::from_millis(16), |_scheduler, work, elapsed| {
//!     // enqueue the update task for `work`; `elapsed` is the time since it
//!     // last ran (or since registration, on the first invocation)
//!     let _ = (work, elapsed);
//! });
//! ```

mod histogram;
pub mod scheduler;

pub use scheduler::{IntervalScheduler, ScheduleHandle, SchedulerConfig, WorkId};
