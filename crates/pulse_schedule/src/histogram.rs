//! Fixed-bucket interval histogram.
//!
//! Tracks how many registered work items fall into each of 32 interval
//! buckets spanning `[min_interval, max_interval]`. The bucket count is fed
//! into the phase randomization when an item is registered, and the bucket
//! populations drive the diagnostic expected-work-per-tick estimate. The
//! histogram never caps how many items may fire in a tick.

use std::time::Duration;

/// Number of fixed histogram buckets.
pub(crate) const SLOT_COUNT: usize = 32;

/// Per-bucket item counts over the `[min, max]` interval range.
#[derive(Debug)]
pub(crate) struct Histogram {
    min: Duration,
    /// Reciprocal of the covered range in seconds (0 when the range is empty).
    inv_range: f64,
    /// Width of one bucket in seconds.
    slot_width: f64,
    counts: [u32; SLOT_COUNT],
}

impl Histogram {
    pub(crate) fn new(min: Duration, max: Duration) -> Self {
        let range = (max - min).as_secs_f64();
        Self {
            min,
            inv_range: if range > 0.0 { 1.0 / range } else { 0.0 },
            slot_width: range / SLOT_COUNT as f64,
            counts: [0; SLOT_COUNT],
        }
    }

    /// Maps an interval to its bucket: `clamp((v - min) * inv_range * 32, 0, 31)`.
    pub(crate) fn index_of(&self, interval: Duration) -> usize {
        let offset = interval.saturating_sub(self.min).as_secs_f64();
        let slot = offset * self.inv_range * SLOT_COUNT as f64;
        (slot as usize).min(SLOT_COUNT - 1)
    }

    /// Representative interval for a bucket (its midpoint).
    pub(crate) fn slot_value(&self, index: usize) -> Duration {
        debug_assert!(index < SLOT_COUNT);
        self.min + Duration::from_secs_f64(self.slot_width * (index as f64 + 0.5))
    }

    /// Records an item with the given interval. Returns the bucket index.
    pub(crate) fn add(&mut self, interval: Duration) -> usize {
        let index = self.index_of(interval);
        self.counts[index] += 1;
        index
    }

    /// Forgets an item with the given interval.
    pub(crate) fn remove(&mut self, interval: Duration) {
        let index = self.index_of(interval);
        debug_assert!(self.counts[index] > 0, "histogram underflow");
        self.counts[index] = self.counts[index].saturating_sub(1);
    }

    pub(crate) fn count(&self, index: usize) -> u32 {
        self.counts[index]
    }

    /// Expected number of items due within a tick of length `delta_time`,
    /// assuming each bucket's items fire at its representative cadence.
    pub(crate) fn expected_work(&self, delta_time: Duration) -> f64 {
        let dt = delta_time.as_secs_f64();
        let mut expected = 0.0;
        for (index, &count) in self.counts.iter().enumerate() {
            if count == 0 {
                continue;
            }
            // Floor the cadence at 1 µs so an empty range cannot divide by zero.
            let cadence = self.slot_value(index).as_secs_f64().max(1e-6);
            expected += f64::from(count) * (dt / cadence);
        }
        expected
    }
}
