//! The interval scheduler — per-tick selection and rescheduling of
//! recurring work items.
//!
//! Items are indexed two ways: an ordered due-time index (a `BTreeMap` keyed
//! by `(due_time, insertion_seq)` so ties break deterministically) used for
//! the per-tick scan, and a hash map from the raw work id to the item used
//! for O(1) update and removal. Every registered item appears in both
//! indices exactly once; the item's `order_key` always names its entry in
//! the due-time index.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::marker::PhantomData;
use std::time::Duration;

use tracing::trace;

use crate::histogram::Histogram;

/// An opaque handle identifying a recurring unit of work.
///
/// Handles are caller-supplied values no larger than 8 bytes; the scheduler
/// assumes nothing about them beyond equality, hashing, and a lossless
/// round-trip through a raw `u64`.
pub trait ScheduleHandle: Copy + Eq + Hash {
    /// Converts the handle to its raw 64-bit representation.
    fn to_raw(self) -> u64;
    /// Reconstructs a handle from its raw 64-bit representation.
    fn from_raw(raw: u64) -> Self;
}

impl ScheduleHandle for u64 {
    fn to_raw(self) -> u64 {
        self
    }

    fn from_raw(raw: u64) -> Self {
        raw
    }
}

impl ScheduleHandle for u32 {
    fn to_raw(self) -> u64 {
        u64::from(self)
    }

    fn from_raw(raw: u64) -> Self {
        raw as u32
    }
}

/// A ready-made work handle for callers without their own id type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkId(pub u64);

impl WorkId {
    /// The null / invalid work id sentinel.
    pub const INVALID: WorkId = WorkId(0);

    /// Create a work id from a raw `u64` identifier.
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw `u64` identifier.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }

    /// Returns `true` if this is a valid (non-zero) work id.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for WorkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WorkId({})", self.0)
    }
}

impl ScheduleHandle for WorkId {
    fn to_raw(self) -> u64 {
        self.0
    }

    fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

/// Configuration for an [`IntervalScheduler`].
///
/// Requested intervals outside `[min_interval, max_interval]` are silently
/// clamped, never rejected.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Smallest accepted work interval.
    pub min_interval: Duration,
    /// Largest accepted work interval.
    pub max_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(1),
            max_interval: Duration::from_secs(1),
        }
    }
}

/// A registered recurring work item.
#[derive(Debug)]
struct WorkItem {
    /// Clamped execution interval.
    interval: Duration,
    /// Absolute simulated time at which the item next becomes due.
    due_time: Duration,
    /// Absolute simulated time at which the item was last serviced (or
    /// registered, before its first invocation).
    last_scheduled: Duration,
    /// Key of this item's entry in the due-time index.
    order_key: (Duration, u64),
}

/// Decides, once per simulation tick, which recurring work items must run.
///
/// Single-threaded by design: the scheduler owns no locking and must be
/// driven from the one logical thread that advances the simulation.
/// Callbacks passed to [`update`](Self::update) receive the scheduler back
/// and may add, update, or remove work mid-tick.
#[derive(Debug)]
pub struct IntervalScheduler<H: ScheduleHandle> {
    min_interval: Duration,
    max_interval: Duration,
    /// Monotonic simulated time, advanced by `update`.
    current_time: Duration,
    /// Advancing seed for initial-phase randomization.
    seed: u32,
    /// Insertion sequence for deterministic due-time tie-breaks.
    next_seq: u64,
    /// Raw id -> item.
    items: HashMap<u64, WorkItem>,
    /// `(due_time, seq)` -> raw id, scanned from the front each tick.
    due_index: BTreeMap<(Duration, u64), u64>,
    histogram: Histogram,
    /// Diagnostic estimate of due items per tick, recomputed each `update`.
    num_work_to_schedule: f64,
    _handle: PhantomData<H>,
}

impl<H: ScheduleHandle> Default for IntervalScheduler<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: ScheduleHandle> IntervalScheduler<H> {
    /// Creates a scheduler with the default configuration (1 ms .. 1 s).
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    /// Creates a scheduler with the given configuration.
    ///
    /// # Panics
    ///
    /// Panics if `min_interval > max_interval` or if the handle type does
    /// not fit into a raw 64-bit id. Both are programmer errors.
    #[must_use]
    pub fn with_config(config: SchedulerConfig) -> Self {
        assert!(
            size_of::<H>() <= size_of::<u64>(),
            "schedule handle type must fit into a raw 64-bit id"
        );
        assert!(
            config.min_interval <= config.max_interval,
            "min_interval must not exceed max_interval"
        );
        Self {
            min_interval: config.min_interval,
            max_interval: config.max_interval,
            current_time: Duration::ZERO,
            seed: 0,
            next_seq: 0,
            items: HashMap::new(),
            due_index: BTreeMap::new(),
            histogram: Histogram::new(config.min_interval, config.max_interval),
            num_work_to_schedule: 0.0,
            _handle: PhantomData,
        }
    }

    /// Registers `work` to run roughly every `interval`, or changes the
    /// interval of an already-registered item.
    ///
    /// New items get a randomized initial due time in
    /// `[current_time, current_time + interval)` so items sharing an
    /// interval do not all fire on the same tick. Re-registering preserves
    /// the item's phase when the old cadence still fits: the next due time
    /// is `max(current_time, last_scheduled + interval)`.
    pub fn add_or_update_work(&mut self, work: H, interval: Duration) {
        let interval = interval.clamp(self.min_interval, self.max_interval);
        let raw = work.to_raw();

        if let Some(item) = self.items.get_mut(&raw) {
            self.due_index.remove(&item.order_key);
            self.histogram.remove(item.interval);
            self.histogram.add(interval);

            let due_time = (item.last_scheduled + interval).max(self.current_time);
            let order_key = (due_time, self.next_seq);
            self.next_seq += 1;

            item.interval = interval;
            item.due_time = due_time;
            item.order_key = order_key;
            self.due_index.insert(order_key, raw);
        } else {
            // Use the bucket population as the hash position so items
            // sharing an interval land on distinct initial phases.
            let bucket = self.histogram.add(interval);
            let phase = random_zero_to_one(self.histogram.count(bucket), &mut self.seed);
            let due_time = self.current_time + interval.mul_f64(phase);
            let order_key = (due_time, self.next_seq);
            self.next_seq += 1;

            self.items.insert(
                raw,
                WorkItem {
                    interval,
                    due_time,
                    last_scheduled: self.current_time,
                    order_key,
                },
            );
            self.due_index.insert(order_key, raw);
        }
    }

    /// Unregisters `work`. Removing an unknown id is a benign no-op:
    /// callers may legitimately unregister work whose owner was already
    /// destroyed through another path.
    pub fn remove_work(&mut self, work: H) {
        if let Some(item) = self.items.remove(&work.to_raw()) {
            self.due_index.remove(&item.order_key);
            self.histogram.remove(item.interval);
        }
    }

    /// Returns the registered interval of `work`, or [`Duration::ZERO`] if
    /// it is not registered.
    #[must_use]
    pub fn interval(&self, work: H) -> Duration {
        self.items
            .get(&work.to_raw())
            .map_or(Duration::ZERO, |item| item.interval)
    }

    /// Returns the absolute simulated time at which `work` next becomes
    /// due, if it is registered.
    #[must_use]
    pub fn due_time(&self, work: H) -> Option<Duration> {
        self.items.get(&work.to_raw()).map(|item| item.due_time)
    }

    /// Advances simulated time by `delta_time` and invokes `callback` once
    /// for every item that became due, passing the elapsed time since that
    /// item last ran.
    ///
    /// The due set is detached from the index before any callback runs, so
    /// callbacks may freely mutate the schedule through the `&mut Self`
    /// they are handed; an item removed or rescheduled by a callback
    /// mid-tick is not serviced again in the same tick.
    ///
    /// Missed periods are coalesced: however large `delta_time` is, each
    /// due item fires exactly once and is rescheduled relative to the new
    /// current time, never to the missed deadlines.
    pub fn update<F>(&mut self, delta_time: Duration, mut callback: F)
    where
        F: FnMut(&mut Self, H, Duration),
    {
        self.current_time += delta_time;
        self.num_work_to_schedule = self.histogram.expected_work(delta_time);

        // Detach every entry due by now. The detached map doubles as the
        // scratch buffer the callbacks must not be able to invalidate.
        let first_not_due = (self.current_time + Duration::from_nanos(1), 0u64);
        let not_due = self.due_index.split_off(&first_not_due);
        let due = std::mem::replace(&mut self.due_index, not_due);

        trace!(
            time_us = self.current_time.as_micros() as u64,
            due = due.len(),
            expected = self.num_work_to_schedule,
            "scheduler update"
        );

        for (key, raw) in due {
            let Some(item) = self.items.get(&raw) else {
                // Removed by an earlier callback this tick.
                continue;
            };
            if item.order_key != key {
                // Rescheduled by an earlier callback this tick.
                continue;
            }
            let elapsed = self.current_time - item.last_scheduled;

            callback(&mut *self, H::from_raw(raw), elapsed);

            let now = self.current_time;
            let Some(item) = self.items.get_mut(&raw) else {
                continue;
            };
            if item.order_key != key {
                // The callback re-registered this item; its reschedule wins.
                continue;
            }
            item.last_scheduled = now;
            item.due_time = now + item.interval;
            let order_key = (item.due_time, self.next_seq);
            item.order_key = order_key;
            self.next_seq += 1;
            self.due_index.insert(order_key, raw);
        }
    }

    /// Current simulated time, the sum of all `update` deltas.
    #[must_use]
    pub fn current_time(&self) -> Duration {
        self.current_time
    }

    /// Number of registered work items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if no work is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Diagnostic estimate of how many items were expected to come due in
    /// the last `update`, derived from the interval histogram.
    #[must_use]
    pub fn expected_work_per_tick(&self) -> f64 {
        self.num_work_to_schedule
    }
}

/// Hash-based pseudo-random value in `[0, 1)`, advancing `seed` per call.
fn random_zero_to_one(position: u32, seed: &mut u32) -> f64 {
    let mut x = position.wrapping_add(*seed).wrapping_mul(0x9E37_79B9);
    x ^= x >> 16;
    x = x.wrapping_mul(0x85EB_CA6B);
    x ^= x >> 13;
    *seed = seed.wrapping_add(0x9E37_79B9);
    f64::from(x >> 8) / f64::from(1u32 << 24)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    fn collect_fired(
        scheduler: &mut IntervalScheduler<WorkId>,
        delta_time: Duration,
    ) -> Vec<(WorkId, Duration)> {
        let mut fired = Vec::new();
        scheduler.update(delta_time, |_, work, elapsed| fired.push((work, elapsed)));
        fired
    }

    #[test]
    fn test_random_zero_to_one_in_range_and_advancing() {
        let mut seed = 0;
        let mut values = Vec::new();
        for position in 0..100 {
            let value = random_zero_to_one(position, &mut seed);
            assert!((0.0..1.0).contains(&value));
            values.push(value);
        }
        // The seed advances, so repeating a position gives a new value.
        let repeat = random_zero_to_one(0, &mut seed);
        assert_ne!(repeat, values[0]);
    }

    #[test]
    fn test_initial_due_time_within_first_interval() {
        let mut scheduler = IntervalScheduler::<WorkId>::new();
        for id in 1..=50 {
            scheduler.add_or_update_work(WorkId::from_raw(id), 10 * MS);
            let due = scheduler.due_time(WorkId::from_raw(id)).unwrap();
            assert!(due < 10 * MS, "initial due time {due:?} not within interval");
        }
    }

    #[test]
    fn test_fires_exactly_once_within_first_interval() {
        let mut scheduler = IntervalScheduler::<WorkId>::new();
        let work = WorkId::from_raw(7);
        scheduler.add_or_update_work(work, 10 * MS);
        let due = scheduler.due_time(work).unwrap();

        let mut fired_at = Vec::new();
        for _ in 0..10 {
            scheduler.update(MS, |scheduler, _, _| {
                fired_at.push(scheduler.current_time());
            });
        }
        assert_eq!(fired_at.len(), 1, "one firing within the first interval");
        // Never before the assigned due time.
        assert!(fired_at[0] >= due);
    }

    #[test]
    fn test_coalesces_missed_periods_into_one_firing() {
        let mut scheduler = IntervalScheduler::<WorkId>::new();
        let work = WorkId::from_raw(1);
        scheduler.add_or_update_work(work, 10 * MS);

        // A full second covers ~100 periods; the callback fires once.
        let fired = collect_fired(&mut scheduler, Duration::from_secs(1));
        assert_eq!(fired.len(), 1);

        // Rescheduled from current time, not from the missed deadlines.
        assert_eq!(
            scheduler.due_time(work),
            Some(Duration::from_secs(1) + 10 * MS)
        );

        // The very next period fires again.
        let fired = collect_fired(&mut scheduler, 10 * MS);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].1, 10 * MS);
    }

    #[test]
    fn test_due_time_monotonic_across_reschedules() {
        let mut scheduler = IntervalScheduler::<WorkId>::new();
        for id in 1..=20 {
            scheduler.add_or_update_work(WorkId::from_raw(id), Duration::from_millis(id * 3));
        }
        for step in 0..200u64 {
            let mut serviced = Vec::new();
            scheduler.update(Duration::from_millis(1 + step % 7), |_, work, _| {
                serviced.push(work);
            });
            let now = scheduler.current_time();
            for work in serviced {
                assert!(scheduler.due_time(work).unwrap() >= now);
            }
        }
    }

    #[test]
    fn test_remove_unknown_id_is_noop() {
        let mut scheduler = IntervalScheduler::<WorkId>::new();
        scheduler.add_or_update_work(WorkId::from_raw(1), 10 * MS);
        scheduler.remove_work(WorkId::from_raw(99));
        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.interval(WorkId::from_raw(99)), Duration::ZERO);
        // Removing twice is equally harmless.
        scheduler.remove_work(WorkId::from_raw(1));
        scheduler.remove_work(WorkId::from_raw(1));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_interval_clamped_to_configured_range() {
        let mut scheduler = IntervalScheduler::<WorkId>::new();
        let work = WorkId::from_raw(1);
        scheduler.add_or_update_work(work, Duration::from_nanos(1));
        assert_eq!(scheduler.interval(work), MS);
        scheduler.add_or_update_work(work, Duration::from_secs(60));
        assert_eq!(scheduler.interval(work), Duration::from_secs(1));
    }

    #[test]
    fn test_update_preserves_phase_when_cadence_fits() {
        let mut scheduler = IntervalScheduler::<WorkId>::new();
        let work = WorkId::from_raw(1);
        scheduler.add_or_update_work(work, 10 * MS);

        // Let it fire once so last_scheduled is a service time.
        let mut fired = 0;
        while fired == 0 {
            scheduler.update(10 * MS, |_, _, _| fired += 1);
        }
        let serviced_at = scheduler.current_time();

        // Re-register with a new interval: phase is preserved.
        scheduler.add_or_update_work(work, 50 * MS);
        assert_eq!(scheduler.due_time(work), Some(serviced_at + 50 * MS));

        // Shrinking the interval below the time already waited snaps the
        // due time to now instead of scheduling into the past.
        scheduler.update(40 * MS, |_, _, _| {});
        scheduler.add_or_update_work(work, 30 * MS);
        assert_eq!(scheduler.due_time(work), Some(scheduler.current_time()));
    }

    #[test]
    fn test_callback_may_remove_other_due_item() {
        let mut scheduler = IntervalScheduler::<WorkId>::new();
        let a = WorkId::from_raw(1);
        let b = WorkId::from_raw(2);
        scheduler.add_or_update_work(a, 10 * MS);
        scheduler.add_or_update_work(b, 10 * MS);

        // Both are due; whichever fires first removes the other.
        let mut fired = Vec::new();
        scheduler.update(20 * MS, |scheduler, work, _| {
            fired.push(work);
            let other = if work == a { b } else { a };
            scheduler.remove_work(other);
        });
        assert_eq!(fired.len(), 1);
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn test_callback_may_add_work_without_firing_it_this_tick() {
        let mut scheduler = IntervalScheduler::<WorkId>::new();
        scheduler.add_or_update_work(WorkId::from_raw(1), 10 * MS);

        let mut fired = 0;
        scheduler.update(20 * MS, |scheduler, _, _| {
            fired += 1;
            scheduler.add_or_update_work(WorkId::from_raw(2), 10 * MS);
        });
        assert_eq!(fired, 1);
        assert_eq!(scheduler.len(), 2);
    }

    #[test]
    fn test_callback_may_reschedule_fired_item() {
        let mut scheduler = IntervalScheduler::<WorkId>::new();
        let work = WorkId::from_raw(1);
        scheduler.add_or_update_work(work, 10 * MS);

        scheduler.update(20 * MS, |scheduler, work, _| {
            scheduler.add_or_update_work(work, 500 * MS);
        });
        assert_eq!(scheduler.interval(work), 500 * MS);
        // The callback's reschedule is authoritative.
        let due = scheduler.due_time(work).unwrap();
        assert!(due >= scheduler.current_time());
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn test_items_sharing_due_tick_each_fire_once() {
        let mut scheduler = IntervalScheduler::<WorkId>::new();
        for id in 1..=10 {
            scheduler.add_or_update_work(WorkId::from_raw(id), 5 * MS);
        }
        let fired = collect_fired(&mut scheduler, 5 * MS);
        assert_eq!(fired.len(), 10);
        let mut ids: Vec<u64> = fired.iter().map(|(work, _)| work.id()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 10);
    }

    #[test]
    fn test_one_second_of_ticks_yields_expected_counts() {
        let mut scheduler = IntervalScheduler::<WorkId>::new();
        let fast_a = WorkId::from_raw(1);
        let fast_b = WorkId::from_raw(2);
        let slow = WorkId::from_raw(3);
        scheduler.add_or_update_work(fast_a, 10 * MS);
        scheduler.add_or_update_work(fast_b, 10 * MS);
        scheduler.add_or_update_work(slow, 100 * MS);

        let mut counts = std::collections::HashMap::new();
        for _ in 0..100 {
            scheduler.update(10 * MS, |_, work, _| {
                *counts.entry(work).or_insert(0u32) += 1;
            });
        }

        assert!((99..=100).contains(&counts[&fast_a]), "{counts:?}");
        assert!((99..=100).contains(&counts[&fast_b]), "{counts:?}");
        assert!((9..=10).contains(&counts[&slow]), "{counts:?}");
    }

    #[test]
    fn test_expected_work_estimate_tracks_population() {
        let mut scheduler = IntervalScheduler::<WorkId>::new();
        for id in 1..=10 {
            scheduler.add_or_update_work(WorkId::from_raw(id), 100 * MS);
        }
        scheduler.update(100 * MS, |_, _, _| {});
        let estimate = scheduler.expected_work_per_tick();
        assert!(estimate > 3.0 && estimate < 30.0, "estimate {estimate}");
    }

    #[test]
    fn test_raw_handle_round_trip() {
        let work = WorkId::from_raw(0xDEAD_BEEF);
        assert_eq!(WorkId::from_raw(work.to_raw()), work);
        assert!(work.is_valid());
        assert!(!WorkId::INVALID.is_valid());

        let mut scheduler = IntervalScheduler::<u32>::new();
        scheduler.add_or_update_work(42u32, 10 * MS);
        let fired = {
            let mut fired = Vec::new();
            scheduler.update(10 * MS, |_, work, _| fired.push(work));
            fired
        };
        assert_eq!(fired, vec![42u32]);
    }

    #[test]
    #[should_panic(expected = "min_interval")]
    fn test_inverted_interval_range_panics() {
        let _ = IntervalScheduler::<WorkId>::with_config(SchedulerConfig {
            min_interval: Duration::from_secs(1),
            max_interval: Duration::from_millis(1),
        });
    }
}
