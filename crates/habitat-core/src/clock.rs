//! Simulation clock.
//!
//! The clock is the single source of truth for simulated time. Every engine
//! receives `delta_ms` and `now_ms` from it, and every TTL cache in the
//! core expires against `now_ms`, so simulated time never depends on the
//! wall clock.
//!
//! All advances use checked arithmetic. The tick counter and the
//! millisecond counter move together; neither is stored elsewhere.

use crate::config::WorldConfig;

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// Tick counter would overflow.
    #[error("tick counter overflow: cannot advance beyond u64::MAX")]
    TickOverflow,

    /// Simulated milliseconds would overflow.
    #[error("simulated time overflow at {now_ms} ms")]
    TimeOverflow {
        /// Time before the failed advance.
        now_ms: u64,
    },

    /// Invalid time configuration (e.g. a zero tick delta).
    #[error("invalid time configuration: {reason}")]
    InvalidConfig {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

/// Tick counter plus monotonically increasing simulated milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimClock {
    /// Ticks completed.
    tick: u64,

    /// Simulated milliseconds since the start.
    now_ms: u64,

    /// Simulated milliseconds per tick.
    delta_ms: u64,
}

impl SimClock {
    /// Create a clock at tick 0 from the world configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if `tick_delta_ms` is 0.
    pub fn new(config: &WorldConfig) -> Result<Self, ClockError> {
        Self::from_parts(0, 0, config.tick_delta_ms)
    }

    /// Create a clock from explicit parameters (state restoration, tests).
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if `delta_ms` is 0.
    pub fn from_parts(tick: u64, now_ms: u64, delta_ms: u64) -> Result<Self, ClockError> {
        if delta_ms == 0 {
            return Err(ClockError::InvalidConfig {
                reason: "tick_delta_ms must be at least 1".to_owned(),
            });
        }
        Ok(Self {
            tick,
            now_ms,
            delta_ms,
        })
    }

    /// Advance by one configured tick. Returns the new tick number.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TickOverflow`] or [`ClockError::TimeOverflow`]
    /// if either counter would exceed `u64::MAX`.
    pub fn advance(&mut self) -> Result<u64, ClockError> {
        self.advance_by(self.delta_ms)
    }

    /// Advance by one tick of `delta_ms` simulated milliseconds.
    ///
    /// The clock is unchanged on error.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TickOverflow`] or [`ClockError::TimeOverflow`]
    /// if either counter would exceed `u64::MAX`.
    pub fn advance_by(&mut self, delta_ms: u64) -> Result<u64, ClockError> {
        let tick = self.tick.checked_add(1).ok_or(ClockError::TickOverflow)?;
        let now_ms = self
            .now_ms
            .checked_add(delta_ms)
            .ok_or(ClockError::TimeOverflow { now_ms: self.now_ms })?;
        self.tick = tick;
        self.now_ms = now_ms;
        Ok(tick)
    }

    /// Ticks completed.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Simulated milliseconds since the start.
    pub const fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Configured simulated milliseconds per tick.
    pub const fn delta_ms(&self) -> u64 {
        self.delta_ms
    }

    /// Whether a cadence of `interval_ms` fell due during the last tick.
    ///
    /// True when the last advance crossed a multiple of `interval_ms`.
    /// An interval of 0 never fires.
    pub fn crossed(&self, interval_ms: u64, last_delta_ms: u64) -> bool {
        let before = self.now_ms.saturating_sub(last_delta_ms);
        match (self.now_ms.checked_div(interval_ms), before.checked_div(interval_ms)) {
            (Some(now), Some(then)) => now > then,
            _ => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn clock_starts_at_zero() {
        let clock = SimClock::new(&WorldConfig::default()).unwrap();
        assert_eq!((clock.tick(), clock.now_ms()), (0, 0));
    }

    #[test]
    fn advance_moves_both_counters() {
        let mut clock = SimClock::from_parts(0, 0, 100).unwrap();
        assert_eq!(clock.advance().ok(), Some(1));
        assert_eq!(clock.advance_by(250).ok(), Some(2));
        assert_eq!(clock.now_ms(), 350);
    }

    #[test]
    fn zero_delta_is_rejected() {
        assert!(matches!(
            SimClock::from_parts(0, 0, 0),
            Err(ClockError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn overflow_leaves_clock_untouched() {
        let mut clock = SimClock::from_parts(5, u64::MAX.saturating_sub(10), 100).unwrap();
        assert!(matches!(clock.advance(), Err(ClockError::TimeOverflow { .. })));
        assert_eq!(clock.tick(), 5);

        let mut clock = SimClock::from_parts(u64::MAX, 0, 100).unwrap();
        assert!(matches!(clock.advance(), Err(ClockError::TickOverflow)));
        assert_eq!(clock.now_ms(), 0);
    }

    #[test]
    fn cadence_fires_once_per_interval() {
        let mut clock = SimClock::from_parts(0, 0, 400).unwrap();
        let fired = (0..10)
            .filter(|_| clock.advance().is_ok() && clock.crossed(1000, 400))
            .count();
        // 4000 ms elapsed: boundaries at 1000, 2000, 3000, 4000.
        assert_eq!(fired, 4);
        assert!(!clock.crossed(0, 400));
    }
}
