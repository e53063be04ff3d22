//! Clock
//!
//! Every duration measured by the harness comes from a [`Clock`] chosen once
//! at process start and passed to whoever needs to time something.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Duration source used for all timing
#[derive(Debug, Clone, Copy)]
pub enum Clock {
    /// `std::time::Instant`, counted from the moment the clock was created
    Monotonic {
        /// Reading that maps to zero
        origin: std::time::Instant,
    },
    /// `SystemTime` since the Unix epoch; coarser and may step backwards
    WallClock,
}

impl Clock {
    /// Pick the best clock of the host
    pub fn detect() -> Self {
        Self::monotonic()
    }

    /// Monotonic high-resolution clock
    pub fn monotonic() -> Self {
        Clock::Monotonic {
            origin: std::time::Instant::now(),
        }
    }

    /// Wall clock fallback
    pub fn wall_clock() -> Self {
        Clock::WallClock
    }

    /// Whether readings can never decrease
    pub fn is_monotonic(&self) -> bool {
        matches!(self, Clock::Monotonic { .. })
    }

    /// Current reading
    #[inline(always)]
    pub fn now(&self) -> Duration {
        match self {
            Clock::Monotonic { origin } => origin.elapsed(),
            Clock::WallClock => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default(),
        }
    }

    /// Time elapsed since an earlier reading, clamped at zero
    #[inline(always)]
    pub fn elapsed_since(&self, start: Duration) -> Duration {
        self.now().saturating_sub(start)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::detect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_elapsed() {
        let clock = Clock::monotonic();
        let start = clock.now();
        std::thread::sleep(Duration::from_millis(10));
        let elapsed = clock.elapsed_since(start);

        assert!(elapsed >= Duration::from_millis(5));
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn test_monotonic_never_decreases() {
        let clock = Clock::detect();
        assert!(clock.is_monotonic());
        let mut previous = clock.now();
        for _ in 0..1000 {
            let current = clock.now();
            assert!(current >= previous);
            previous = current;
        }
    }

    #[test]
    fn test_wall_clock() {
        let clock = Clock::wall_clock();
        assert!(!clock.is_monotonic());
        // Well after 2001-09-09
        assert!(clock.now() > Duration::from_secs(1_000_000_000));
    }

    #[test]
    fn test_elapsed_since_future_reading_is_zero() {
        let clock = Clock::monotonic();
        let future = clock.now() + Duration::from_secs(3600);
        assert_eq!(clock.elapsed_since(future), Duration::ZERO);
    }
}
