#[cfg(test)]
#[macro_use]
extern crate approx;
use bincode::{Decode, Encode};
use core::ops::{Add, Sub};
pub use quanta::Instant;
use quanta::{Clock, Mock};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// Durations and timestamps are u64 nanoseconds.
/// They are always positive to simplify the reasoning on the user side.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Default,
    Encode,
    Decode,
)]
pub struct TfDuration(pub u64);

/// A timestamp is a duration from a fixed reference point.
/// The zero timestamp is reserved: it means "the latest available sample".
pub type TfTime = TfDuration;

impl TfDuration {
    pub const ZERO: TfDuration = TfDuration(0);
    pub const MAX: TfDuration = TfDuration(u64::MAX);

    /// Alias of [`TfDuration::ZERO`] that reads better at lookup call sites.
    pub const LATEST: TfTime = TfDuration(0);

    #[inline]
    pub const fn from_nanos(nanos: u64) -> Self {
        TfDuration(nanos)
    }

    #[inline]
    pub const fn from_micros(micros: u64) -> Self {
        TfDuration(micros.saturating_mul(1_000))
    }

    #[inline]
    pub const fn from_millis(millis: u64) -> Self {
        TfDuration(millis.saturating_mul(1_000_000))
    }

    #[inline]
    pub const fn from_secs(secs: u64) -> Self {
        TfDuration(secs.saturating_mul(1_000_000_000))
    }

    /// Builds a duration from fractional seconds.
    /// Returns None for negative, NaN or infinite inputs, and for values that do not fit.
    pub fn try_from_secs_f64(secs: f64) -> Option<Self> {
        if !secs.is_finite() || secs < 0.0 {
            return None;
        }
        let nanos = (secs * NANOS_PER_SEC).round();
        if nanos > u64::MAX as f64 {
            return None;
        }
        Some(TfDuration(nanos as u64))
    }

    #[inline]
    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    #[inline]
    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / NANOS_PER_SEC
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn saturating_sub(self, rhs: Self) -> Self {
        TfDuration(self.0.saturating_sub(rhs.0))
    }

    #[inline]
    pub const fn saturating_add(self, rhs: Self) -> Self {
        TfDuration(self.0.saturating_add(rhs.0))
    }

    #[inline]
    pub const fn abs_diff(self, other: Self) -> Self {
        TfDuration(self.0.abs_diff(other.0))
    }
}

impl From<Duration> for TfDuration {
    fn from(duration: Duration) -> Self {
        TfDuration(duration.as_nanos().min(u64::MAX as u128) as u64)
    }
}

impl From<TfDuration> for Duration {
    fn from(duration: TfDuration) -> Self {
        Duration::from_nanos(duration.0)
    }
}

impl From<u64> for TfDuration {
    fn from(duration: u64) -> Self {
        TfDuration(duration)
    }
}

impl From<TfDuration> for u64 {
    fn from(duration: TfDuration) -> Self {
        duration.0
    }
}

impl Sub for TfDuration {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        TfDuration(self.0 - rhs.0)
    }
}

impl Add for TfDuration {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        TfDuration(self.0 + rhs.0)
    }
}

// largest unit first
const DISPLAY_UNITS: [(u64, &str); 6] = [
    (86_400_000_000_000, "d"),
    (3_600_000_000_000, "h"),
    (60_000_000_000, "m"),
    (1_000_000_000, "s"),
    (1_000_000, "ms"),
    (1_000, "µs"),
];

impl Display for TfDuration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match DISPLAY_UNITS.iter().find(|(scale, _)| self.0 >= *scale) {
            Some((scale, unit)) => write!(f, "{:.3} {unit}", self.0 as f64 / *scale as f64),
            None => write!(f, "{} ns", self.0),
        }
    }
}

/// Monotonic nanosecond clock that reads zero when created.
///
/// Clones share the same origin, and a mocked clock stays mocked in every clone,
/// which lets tests drive the time seen by a whole graph.
#[derive(Clone, Debug)]
pub struct RobotClock {
    source: Clock,
    origin: Instant,
}

/// Handle moving the time of a mocked [`RobotClock`].
#[derive(Debug, Clone)]
pub struct RobotClockMock(Arc<Mock>);

impl RobotClockMock {
    pub fn advance(&self, amount: Duration) {
        self.0.increment(amount);
    }

    /// Jumps to `time` measured from the clock origin, possibly backwards.
    pub fn set(&self, time: TfTime) {
        let current = self.0.value();
        let target = time.as_nanos();
        if current <= target {
            self.0.increment(Duration::from_nanos(target - current));
        } else {
            self.0.decrement(Duration::from_nanos(current - target));
        }
    }
}

impl RobotClock {
    pub fn new() -> Self {
        let source = Clock::new();
        let origin = source.now();
        RobotClock { source, origin }
    }

    /// A clock frozen at zero until moved through the returned handle.
    pub fn mock() -> (Self, RobotClockMock) {
        let (source, mock) = Clock::mock();
        let origin = source.now();
        (RobotClock { source, origin }, RobotClockMock(mock))
    }

    #[inline]
    pub fn now(&self) -> TfTime {
        (self.source.now() - self.origin).into()
    }
}

impl Default for RobotClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_is_shared_by_clones() {
        let (clock, mock) = RobotClock::mock();
        let copy = clock.clone();
        assert_eq!(clock.now(), TfDuration::ZERO);
        mock.advance(Duration::from_millis(1500));
        assert_eq!(copy.now(), TfDuration::from_millis(1500));
        mock.set(TfDuration::from_secs(1));
        assert_eq!(clock.now(), TfDuration::from_secs(1));
    }

    #[test]
    fn test_real_clock_moves_forward() {
        let clock = RobotClock::new();
        let first = clock.now();
        std::thread::sleep(Duration::from_millis(2));
        assert!(clock.now() > first);
    }

    #[test]
    fn test_secs_f64_conversions() {
        assert_eq!(
            TfDuration::try_from_secs_f64(0.1),
            Some(TfDuration::from_millis(100))
        );
        assert_eq!(TfDuration::try_from_secs_f64(-1.0), None);
        assert_eq!(TfDuration::try_from_secs_f64(f64::NAN), None);
        assert_eq!(TfDuration::try_from_secs_f64(f64::INFINITY), None);
        assert_relative_eq!(TfDuration::from_millis(1500).as_secs_f64(), 1.5);
    }

    #[test]
    fn test_some_time_arithmetics() {
        let a: TfDuration = 10.into();
        let b: TfDuration = 20.into();
        assert_eq!((a + b).0, 30);
        assert_eq!((b - a).0, 10);
        assert_eq!(a.saturating_sub(b), TfDuration::ZERO);
        assert_eq!(a.abs_diff(b), TfDuration(10));
        assert!(TfDuration::LATEST.is_zero());
    }

    #[test]
    fn test_display() {
        assert_eq!(TfDuration(12).to_string(), "12 ns");
        assert_eq!(TfDuration::from_millis(100).to_string(), "100.000 ms");
        assert_eq!(TfDuration::from_secs(2).to_string(), "2.000 s");
    }
}
