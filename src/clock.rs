//! Time source for message stamps.
//!
//! Lichat clocks are universal time: whole seconds since 1900-01-01T00:00Z.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds between 1900-01-01 and the Unix epoch.
pub const UNIVERSAL_TIME_OFFSET: i64 = 2_208_988_800;

/// Source of clock values for outgoing messages.
pub trait Clock: Send + Sync {
    /// Current time in universal-time seconds.
    fn now(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        let unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        unix + UNIVERSAL_TIME_OFFSET
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::Release);
    }

    pub fn advance(&self, seconds: i64) {
        self.now.fetch_add(seconds, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_universal_time() {
        // 2020-01-01T00:00Z in universal time.
        assert!(SystemClock.now() > 3_786_825_600);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(1000);
        clock.advance(601);
        assert_eq!(clock.now(), 1601);

        clock.set(5);
        assert_eq!(clock.now(), 5);
    }
}
