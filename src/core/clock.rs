use super::types::Tick;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

/// Shared simulation clock.
///
/// The tick driver is the only writer; every worker reads it to time its
/// waits and to notice the end of the run.
#[derive(Debug)]
pub struct TickClock {
    tick: AtomicU64,
    ended: AtomicBool,
    total_ticks: Tick,
    tick_duration: Duration,
}

impl TickClock {
    pub fn new(total_ticks: Tick, tick_duration: Duration) -> Self {
        Self {
            tick: AtomicU64::new(0),
            ended: AtomicBool::new(false),
            total_ticks,
            tick_duration,
        }
    }

    /// Current tick
    pub fn now(&self) -> Tick {
        self.tick.load(Ordering::Acquire)
    }

    pub fn total_ticks(&self) -> Tick {
        self.total_ticks
    }

    pub fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    /// Move the clock forward by one tick and return the new value
    pub(crate) fn advance(&self) -> Tick {
        self.tick.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Mark the run as over. Idempotent.
    pub(crate) fn end(&self) {
        self.ended.store(true, Ordering::SeqCst);
    }

    pub fn has_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst) || self.now() >= self.total_ticks
    }

    /// Block for `ticks` tick-equivalents of wall time. Never cut short.
    pub fn sleep_ticks(&self, ticks: u64) {
        if self.tick_duration.is_zero() || ticks == 0 {
            return;
        }
        let ticks = u32::try_from(ticks).unwrap_or(u32::MAX);
        thread::sleep(self.tick_duration.saturating_mul(ticks));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_ends_at_total_ticks() {
        let clock = TickClock::new(2, Duration::ZERO);
        assert!(!clock.has_ended());
        assert_eq!(clock.advance(), 1);
        assert!(!clock.has_ended());
        assert_eq!(clock.advance(), 2);
        assert!(clock.has_ended());
    }

    #[test]
    fn test_explicit_end() {
        let clock = TickClock::new(100, Duration::ZERO);
        clock.advance();
        clock.end();
        assert!(clock.has_ended());
        assert_eq!(clock.now(), 1);
    }

    #[test]
    fn test_sleep_scales_with_tick_duration() {
        let clock = TickClock::new(10, Duration::from_millis(2));
        let started = std::time::Instant::now();
        clock.sleep_ticks(5);
        assert!(started.elapsed() >= Duration::from_millis(10));
    }
}
