//! Discrete sub-day time for the agent-based model, in seconds.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Sub, SubAssign};

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// A duration in seconds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct TimeSpan {
    pub seconds: i64,
}

/// A point in time, in seconds since the start of the simulation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct TimePoint {
    pub seconds: i64,
}

#[must_use]
pub fn seconds(s: i64) -> TimeSpan {
    TimeSpan { seconds: s }
}

#[must_use]
pub fn minutes(m: i64) -> TimeSpan {
    TimeSpan { seconds: m * 60 }
}

#[must_use]
pub fn hours(h: i64) -> TimeSpan {
    TimeSpan { seconds: h * 60 * 60 }
}

#[must_use]
pub fn days(d: i64) -> TimeSpan {
    TimeSpan {
        seconds: d * SECONDS_PER_DAY,
    }
}

impl TimeSpan {
    /// Length in days as a real number.
    #[must_use]
    pub fn as_days(self) -> f64 {
        self.seconds as f64 / SECONDS_PER_DAY as f64
    }

    #[must_use]
    pub fn max_value() -> TimeSpan {
        TimeSpan { seconds: i64::MAX }
    }
}

impl TimePoint {
    #[must_use]
    pub fn new(seconds: i64) -> TimePoint {
        TimePoint { seconds }
    }

    #[must_use]
    pub fn max_value() -> TimePoint {
        TimePoint { seconds: i64::MAX }
    }

    /// Time since the start of the simulation in days.
    #[must_use]
    pub fn as_days(self) -> f64 {
        self.seconds as f64 / SECONDS_PER_DAY as f64
    }

    /// Completed days since the start of the simulation.
    #[must_use]
    pub fn day(self) -> i64 {
        self.seconds.div_euclid(SECONDS_PER_DAY)
    }

    /// Hour within the current day, 0-23.
    #[must_use]
    pub fn hour_of_day(self) -> i64 {
        self.seconds.rem_euclid(SECONDS_PER_DAY) / 3600
    }

    /// Seconds within the current day.
    #[must_use]
    pub fn time_since_midnight(self) -> TimeSpan {
        TimeSpan {
            seconds: self.seconds.rem_euclid(SECONDS_PER_DAY),
        }
    }

    /// Day of the week, 0 = Monday .. 6 = Sunday. The simulation starts on a
    /// Monday.
    #[must_use]
    pub fn day_of_week(self) -> i64 {
        self.day().rem_euclid(7)
    }

    #[must_use]
    pub fn is_weekend(self) -> bool {
        self.day_of_week() >= 5
    }
}

impl Add<TimeSpan> for TimePoint {
    type Output = TimePoint;
    fn add(self, rhs: TimeSpan) -> TimePoint {
        TimePoint {
            seconds: self.seconds + rhs.seconds,
        }
    }
}

impl AddAssign<TimeSpan> for TimePoint {
    fn add_assign(&mut self, rhs: TimeSpan) {
        self.seconds += rhs.seconds;
    }
}

impl Sub<TimeSpan> for TimePoint {
    type Output = TimePoint;
    fn sub(self, rhs: TimeSpan) -> TimePoint {
        TimePoint {
            seconds: self.seconds - rhs.seconds,
        }
    }
}

impl Sub for TimePoint {
    type Output = TimeSpan;
    fn sub(self, rhs: TimePoint) -> TimeSpan {
        TimeSpan {
            seconds: self.seconds - rhs.seconds,
        }
    }
}

impl Add for TimeSpan {
    type Output = TimeSpan;
    fn add(self, rhs: TimeSpan) -> TimeSpan {
        TimeSpan {
            seconds: self.seconds + rhs.seconds,
        }
    }
}

impl AddAssign for TimeSpan {
    fn add_assign(&mut self, rhs: TimeSpan) {
        self.seconds += rhs.seconds;
    }
}

impl Sub for TimeSpan {
    type Output = TimeSpan;
    fn sub(self, rhs: TimeSpan) -> TimeSpan {
        TimeSpan {
            seconds: self.seconds - rhs.seconds,
        }
    }
}

impl SubAssign for TimeSpan {
    fn sub_assign(&mut self, rhs: TimeSpan) {
        self.seconds -= rhs.seconds;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hour_and_day_arithmetic() {
        let t = TimePoint::new(0) + days(2) + hours(8);
        assert_eq!(t.day(), 2);
        assert_eq!(t.hour_of_day(), 8);
        assert_eq!(t.day_of_week(), 2);
        assert!(!t.is_weekend());
        let weekend = TimePoint::new(0) + days(5);
        assert!(weekend.is_weekend());
    }

    #[test]
    fn difference_of_time_points_is_a_span() {
        let a = TimePoint::new(0) + hours(30);
        let b = TimePoint::new(0) + hours(6);
        assert_eq!(a - b, hours(24));
        assert_eq!((a - b).as_days(), 1.0);
    }
}
