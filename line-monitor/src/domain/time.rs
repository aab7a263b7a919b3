//! Countdown arithmetic on wall-clock time of day.
//!
//! The line runs across midnight, and the backend's entry times are only
//! meaningful as a time of day relative to "now". Everything here works in
//! seconds since midnight and treats a negative elapsed time as a day
//! rollover: a carrier that entered at 23:58 and is looked at 00:01 has been
//! in the bath for three minutes, not minus twenty-three hours.

use chrono::{NaiveTime, Timelike};

/// Seconds in one day.
pub const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Seconds since midnight, ignoring any leap-second fraction.
pub fn seconds_of_day(time: NaiveTime) -> i64 {
    i64::from(time.num_seconds_from_midnight())
}

/// Seconds elapsed from `start` to `now`, wrapping at midnight.
///
/// Always in `0..SECONDS_PER_DAY`.
///
/// # Examples
///
/// ```
/// use chrono::NaiveTime;
/// use line_monitor::domain::time::elapsed_since;
///
/// let start = NaiveTime::from_hms_opt(23, 58, 0).unwrap();
/// let now = NaiveTime::from_hms_opt(0, 1, 0).unwrap();
/// assert_eq!(elapsed_since(start, now), 180);
/// ```
pub fn elapsed_since(start: NaiveTime, now: NaiveTime) -> i64 {
    let elapsed = seconds_of_day(now) - seconds_of_day(start);
    if elapsed < 0 {
        elapsed + SECONDS_PER_DAY
    } else {
        elapsed
    }
}

/// Remaining processing time in seconds.
///
/// Returns `None` when either input is unknown or the duration is not
/// positive; the caller shows that as "unknown" rather than as zero.
/// Otherwise the result is floored at zero.
///
/// # Examples
///
/// ```
/// use chrono::NaiveTime;
/// use line_monitor::domain::time::remaining;
///
/// let entry = NaiveTime::from_hms_opt(23, 58, 0).unwrap();
/// let now = NaiveTime::from_hms_opt(0, 1, 0).unwrap();
/// assert_eq!(remaining(Some(entry), Some(180), now), Some(0));
/// assert_eq!(remaining(Some(entry), Some(240), now), Some(60));
/// assert_eq!(remaining(None, Some(240), now), None);
/// assert_eq!(remaining(Some(entry), Some(0), now), None);
/// ```
pub fn remaining(entry: Option<NaiveTime>, duration_secs: Option<i64>, now: NaiveTime) -> Option<u64> {
    let entry = entry?;
    let duration = duration_secs?;
    if duration <= 0 {
        return None;
    }

    let left = duration - elapsed_since(entry, now);
    Some(left.max(0) as u64)
}
