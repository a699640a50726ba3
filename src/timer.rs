//! Fixed-period timers
//!
//! Session timers advance only by the elapsed time the caller hands them.

use serde::{Deserialize, Serialize};

/// Fixed-period timer driven by explicit elapsed time.
///
/// Replaces wall-clock intervals: the owner advances it and asks whether it
/// is due, then re-arms it. Dropping the owner stops it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepeatingTimer {
    period_ms: u64,
    until_next_ms: u64,
}

impl RepeatingTimer {
    /// First fire is one full period from now
    pub fn new(period_ms: u64) -> Self {
        let period_ms = period_ms.max(1);
        Self {
            period_ms,
            until_next_ms: period_ms,
        }
    }

    pub fn period_ms(&self) -> u64 {
        self.period_ms
    }

    pub fn until_next_ms(&self) -> u64 {
        self.until_next_ms
    }

    pub fn advance(&mut self, dt_ms: u64) {
        self.until_next_ms = self.until_next_ms.saturating_sub(dt_ms);
    }

    pub fn is_due(&self) -> bool {
        self.until_next_ms == 0
    }

    pub fn rearm(&mut self) {
        self.until_next_ms = self.period_ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_fires_after_full_period() {
        let mut t = RepeatingTimer::new(50);
        t.advance(49);
        assert!(!t.is_due());
        assert_eq!(t.until_next_ms(), 1);

        t.advance(1);
        assert!(t.is_due());
        t.rearm();
        assert_eq!(t.until_next_ms(), 50);
    }

    #[test]
    fn timer_does_not_underflow() {
        let mut t = RepeatingTimer::new(10);
        t.advance(1_000);
        assert!(t.is_due());
        assert_eq!(t.until_next_ms(), 0);
    }

    #[test]
    fn zero_period_is_bumped() {
        assert_eq!(RepeatingTimer::new(0).period_ms(), 1);
    }
}
