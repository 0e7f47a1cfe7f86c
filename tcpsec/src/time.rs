/*! Time structures.

The `time` module contains structures used to represent both
absolute and relative time.

 - [Instant] is used to represent absolute time.
 - [Duration] is used to represet relative time.
 - [Expiration] is a deadline which may never come, used for timer slots.

The TCP estimators do not count in milliseconds but in *slow ticks*, the granularity of the
classic BSD slow timeout (two per second). [`ticks`] and [`from_ticks`] convert between the two.

[Instant]: struct.Instant.html
[Duration]: struct.Duration.html
[Expiration]: enum.Expiration.html
[`ticks`]: fn.ticks.html
[`from_ticks`]: fn.from_ticks.html
*/
use core::{cmp, fmt, ops};
pub use core::time::Duration;

/// Number of slow ticks in one second.
pub const SLOW_HZ: u32 = 2;

/// A representation of an absolute time value.
///
/// The `Instant` type is a wrapper around a `i64` value that
/// represents a number of milliseconds, monotonically increasing
/// since an arbitrary moment in time, such as system startup.
///
/// * A value of `0` is inherently arbitrary.
/// * A value less than `0` indicates a time before the starting
///   point.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Instant {
    /// Milliseconds since the arbitrary epoch.
    pub millis: i64,
}

/// An expiration time, inversion of `Option`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    /// Expires at the given instant.
    When(Instant),
    /// Is never reached.
    Never,
}

use Expiration::{When, Never};

impl Instant {
    /// Create a new `Instant` from a number of milliseconds.
    pub fn from_millis<T: Into<i64>>(millis: T) -> Instant {
        Instant { millis: millis.into() }
    }

    /// Create a new `Instant` from a number of seconds.
    pub fn from_secs<T: Into<i64>>(secs: T) -> Instant {
        Instant { millis: secs.into() * 1000 }
    }

    /// The total number of milliseconds that have passed since
    /// the biginning of time.
    pub fn total_millis(&self) -> i64 {
        self.millis
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{:03}s", self.millis / 1000, self.millis % 1000)
    }
}

impl ops::Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, rhs: Duration) -> Instant {
        Instant::from_millis(self.millis + rhs.as_millis() as i64)
    }
}

impl ops::Sub<Instant> for Instant {
    type Output = Duration;

    fn sub(self, rhs: Instant) -> Duration {
        Duration::from_millis((self.millis - rhs.millis).abs() as u64)
    }
}

impl Expiration {
    /// Check if the expiration has been reached at `now`.
    pub fn is_expired(self, now: Instant) -> bool {
        match self {
            When(at) => at <= now,
            Never => false,
        }
    }

    /// The deadline, if there is one.
    pub fn deadline(self) -> Option<Instant> {
        match self {
            When(at) => Some(at),
            Never => None,
        }
    }
}

impl Default for Expiration {
    fn default() -> Self {
        Never
    }
}

impl From<Instant> for Expiration {
    fn from(instant: Instant) -> Self {
        When(instant)
    }
}

impl cmp::PartialOrd for Expiration {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl cmp::Ord for Expiration {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        match (self, other) {
            (Never, Never) => cmp::Ordering::Equal,
            (Never, When(_)) => cmp::Ordering::Greater,
            (When(_), Never) => cmp::Ordering::Less,
            (When(a), When(b)) => a.cmp(b),
        }
    }
}

/// Round a duration to whole slow ticks, at least one for a non-zero duration.
pub fn ticks(duration: Duration) -> u32 {
    let millis = duration.as_millis();
    let per_tick = u128::from(1000 / SLOW_HZ);
    let ticks = (millis + per_tick - 1) / per_tick;
    cmp::min(ticks, u128::from(u32::max_value())) as u32
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tick_conversion() {
        assert_eq!(ticks(Duration::from_secs(3)), 6);
        assert_eq!(ticks(Duration::from_millis(1)), 1);
        assert_eq!(ticks(Duration::from_millis(0)), 0);
    }

    #[test]
    fn expiration_order() {
        let soon = Expiration::When(Instant::from_secs(1));
        let later = Expiration::When(Instant::from_secs(2));
        assert!(soon < later);
        assert!(later < Expiration::Never);
        assert!(soon.is_expired(Instant::from_secs(1)));
        assert!(!Expiration::Never.is_expired(Instant::from_secs(i64::from(u32::max_value()))));
    }
}
