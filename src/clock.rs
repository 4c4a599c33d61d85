//! Time sources.
//!
//! Every "now" in the crate (act timestamps, `started_at`, `ended_at`) comes
//! from a [`Clock`], so ledgers can be replayed and tested deterministically.

use chrono::{DateTime, Duration, Utc};

/// A source of the current instant.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at a fixed instant.
///
/// # Examples
///
/// ```
/// use astra::clock::{Clock, FixedClock};
/// use chrono::{Duration, TimeZone, Utc};
///
/// let start = Utc.with_ymd_and_hms(2025, 1, 15, 14, 30, 0).unwrap();
/// let clock = FixedClock::at(start);
/// assert_eq!(clock.now(), start);
/// assert_eq!(clock.advanced(Duration::seconds(90)).now(), start + Duration::seconds(90));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock {
    at: DateTime<Utc>,
}

impl FixedClock {
    /// Creates a clock that always reports `at`.
    #[must_use]
    pub const fn at(at: DateTime<Utc>) -> Self {
        Self { at }
    }

    /// Returns a copy of this clock moved forward by `by`.
    #[must_use]
    pub fn advanced(&self, by: Duration) -> Self {
        Self { at: self.at + by }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.at
    }
}

/// Milliseconds elapsed from `from` to `to`; negative if `to` precedes `from`.
#[must_use]
pub fn elapsed_ms(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    to.signed_duration_since(from).num_milliseconds()
}
