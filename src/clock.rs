/*
 * Clock
 *
 * Monotonic time source.
 *
 * The reference implementation reads `gettimeofday` and logs elapsed
 * microseconds; here that's expressed as a small trait so tests can swap in
 * a deterministic clock without touching the scheduler.
 */

use std::time::Instant;

pub trait Clock: Send + Sync {
    /// Microseconds elapsed since this clock was created.
    fn now_micros(&self) -> u64;
}

/// Wall-clock implementation backed by [`Instant`].
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_micros(&self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_and_starts_near_zero() {
        let clock = SystemClock::new();
        let first = clock.now_micros();
        std::thread::sleep(std::time::Duration::from_millis(1));
        let second = clock.now_micros();
        assert!(second >= first);
        assert!(first < 1_000_000);
    }
}
