use std::time::{SystemTime, UNIX_EPOCH};

const MILLIS_PER_DAY: i64 = 86_400_000;

/// A wall-clock source, in milliseconds since the UNIX epoch.
///
/// Timestamps stamped on points and the diurnal term of the temperature
/// surface both read from this, so tests can pin time.
pub trait WallClock {
    fn now_millis(&self) -> i64;

    fn now_secs(&self) -> i64 {
        self.now_millis().div_euclid(1000)
    }

    /// Fraction of the current UTC day that has elapsed, in `[0, 1)`.
    fn day_fraction(&self) -> f64 {
        self.now_millis().rem_euclid(MILLIS_PER_DAY) as f64 / MILLIS_PER_DAY as f64
    }
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now_millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as i64)
    }
}

/// A clock frozen at a fixed instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl WallClock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.0
    }
}
