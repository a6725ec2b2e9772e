// Time helpers
// Wall-clock time, only used for logging, age checks and request timestamps

use chrono::{Datelike, NaiveDate, Utc};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

// Millis timestamps used to determine it using its type
pub type TimestampMillis = u64;

// Seconds timestamps used to determine it using its type
pub type TimestampSeconds = u64;

#[inline]
pub fn get_current_time() -> Duration {
    // A clock set before 1970 is reported as the epoch itself
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

// Return timestamp in seconds
pub fn get_current_time_in_seconds() -> TimestampSeconds {
    get_current_time().as_secs()
}

// Return timestamp in milliseconds
// We cast it to u64 as we have plenty of time before it overflows (year 584,942,417 AD)
pub fn get_current_time_in_millis() -> TimestampMillis {
    get_current_time().as_millis() as TimestampMillis
}

// Current UTC date
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Full years elapsed between `birth` and `on`
/// Returns 0 when `birth` is after `on`
pub fn age_on(birth: NaiveDate, on: NaiveDate) -> u32 {
    if birth > on {
        return 0;
    }
    let mut years = on.year() - birth.year();
    if (on.month(), on.day()) < (birth.month(), birth.day()) {
        years -= 1;
    }
    years.max(0) as u32
}
