//! A Lamport-style logical clock that loosely tracks wall-clock time.
//!
//! Seeded from nanosecond wall time so values stay human-readable and roughly
//! comparable across nodes with sane clocks, while every operation on a single
//! node is still strictly increasing.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// An opaque logical timestamp. Ordering is the only thing callers may rely on.
pub type LogicalTime = u64;

fn wall_nanos() -> LogicalTime {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_nanos() as LogicalTime
}

/// Mutex-serialised monotonic counter, advanced by both local events and
/// observed remote timestamps.
#[derive(Debug)]
pub struct LogicalClock {
    time: Mutex<LogicalTime>,
}

impl LogicalClock {
    /// Create a clock seeded from the current wall-clock time.
    pub fn new() -> Self {
        LogicalClock {
            time: Mutex::new(wall_nanos()),
        }
    }

    /// Advance to `max(self, wall)` and return the result without incrementing.
    pub fn now(&self) -> LogicalTime {
        self.get_inc(0)
    }

    /// Advance to `max(self, wall)`, increment, and return the new value.
    pub fn inc(&self) -> LogicalTime {
        self.get_inc(1)
    }

    fn get_inc(&self, inc: LogicalTime) -> LogicalTime {
        let wall = wall_nanos();
        let mut time = self.time.lock().unwrap();
        if wall > *time {
            *time = wall;
        }
        *time += inc;
        *time
    }

    /// Advance to `max(self, t)`, then increment (observing a remote timestamp
    /// always moves this node's clock forward).
    pub fn update(&self, t: LogicalTime) {
        let mut time = self.time.lock().unwrap();
        if t > *time {
            *time = t;
        }
        *time += 1;
    }
}

impl Default for LogicalClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successive_reads_strictly_increase() {
        let clock = LogicalClock::new();
        let mut prev = clock.now();
        for _ in 0..1000 {
            let next = clock.inc();
            assert!(next > prev, "{next} should be > {prev}");
            prev = next;
        }
    }

    #[test]
    fn update_advances_past_observed_time() {
        let clock = LogicalClock::new();
        let far_future = clock.now() + 1_000_000_000;
        clock.update(far_future);
        assert!(clock.now() > far_future);
    }

    #[test]
    fn update_with_stale_time_still_increments() {
        let clock = LogicalClock::new();
        let before = clock.now();
        clock.update(0);
        assert!(clock.now() > before);
    }
}
