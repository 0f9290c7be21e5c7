//! Temporal Module
//!
//! Conversions between calendar time, millisecond POSIX timestamps and
//! ages in years, used by the age-based filters and the average-age
//! statistic.

use chrono::{DateTime, Duration, Utc};

/// Length of a year in days, including the leap-year fraction.
pub const YEAR_TO_DAYS: f64 = 365.25;

/// Length of a year in milliseconds.
pub const YEAR_TO_MILLIS: f64 = YEAR_TO_DAYS * 24.0 * 60.0 * 60.0 * 1000.0;

/// The minimum representable timestamp.
///
/// Cached records start at this value, and a failed fetch resets a record
/// back to it so the next listing pass re-schedules the fetch.
pub const MIN_TIMESTAMP: DateTime<Utc> = DateTime::<Utc>::MIN_UTC;

/// Milliseconds since the POSIX epoch for a calendar instant.
pub fn datetime_to_millis(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

/// Millisecond timestamp of the instant `age_years` years before `now`.
///
/// Ages large enough to under-run the representable calendar range fall
/// back to `MIN_TIMESTAMP`, which makes the corresponding age bound match
/// everything or nothing rather than failing the request.
pub fn timestamp_from_age(now: DateTime<Utc>, age_years: f64) -> i64 {
    let millis = age_years * YEAR_TO_MILLIS;
    let offset = if millis.is_finite() && millis.abs() < i64::MAX as f64 {
        Duration::try_milliseconds(millis as i64)
    } else {
        None
    };

    match offset.and_then(|off| now.checked_sub_signed(off)) {
        Some(dt) => datetime_to_millis(dt),
        None => datetime_to_millis(MIN_TIMESTAMP),
    }
}

/// Possibly fractional number of years between the millisecond timestamp
/// `millis` and `now`.
pub fn age_from_timestamp(now: DateTime<Utc>, millis: f64) -> f64 {
    (datetime_to_millis(now) as f64 - millis) / YEAR_TO_MILLIS
}
