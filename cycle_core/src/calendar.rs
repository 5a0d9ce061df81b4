//! Calendar helpers shared by the calculator, statistics and export.

use chrono::{Duration, NaiveDate};

/// Shift a date by a signed number of days
///
/// Returns `None` instead of panicking when the result would leave the
/// range chrono can represent.
pub fn add_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    Duration::try_days(days).and_then(|delta| date.checked_add_signed(delta))
}

/// Signed number of days from `from` to `to`
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// Gregorian leap year rule: divisible by 4, except centuries not divisible by 400
pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Check whether `day`/`month`/`year` names a real calendar date
pub fn is_valid_date(day: u32, month: u32, year: i32) -> bool {
    NaiveDate::from_ymd_opt(year, month, day).is_some()
}

/// Inclusive length of a period in days
///
/// Returns 0 when either date is missing or `end` is before `start`.
pub fn period_length(start: Option<NaiveDate>, end: Option<NaiveDate>) -> i64 {
    match (start, end) {
        (Some(start), Some(end)) if end >= start => days_between(start, end) + 1,
        _ => 0,
    }
}
