//! DATE, TIME and TIMESTAMP encoding
//!
//! Firebird stores a date as the number of days since 1858-11-17 (the
//! Modified Julian Day epoch) and a time as the number of 1/10000 second
//! ticks since midnight. A timestamp is a date word followed by a time word.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};

use crate::error::{Error, Result};

/// Ticks per second in a TIME value
pub const TICKS_PER_SECOND: i64 = 10_000;

const NANOS_PER_TICK: u32 = 100_000;

fn epoch() -> NaiveDate {
    // 1858-11-17 is always representable.
    NaiveDate::from_ymd_opt(1858, 11, 17).unwrap_or(NaiveDate::MIN)
}

/// Encode a date as days since 1858-11-17
pub fn encode_date(date: NaiveDate) -> i32 {
    date.signed_duration_since(epoch()).num_days() as i32
}

/// Decode a day count into a date
pub fn decode_date(days: i32) -> Result<NaiveDate> {
    epoch()
        .checked_add_signed(TimeDelta::days(days as i64))
        .ok_or_else(|| Error::DataConversion(format!("date value {} out of range", days)))
}

/// Encode a time of day as ticks since midnight
///
/// Precision below 100 microseconds is dropped.
pub fn encode_time(time: NaiveTime) -> i32 {
    let nanos = time.nanosecond().min(999_999_999);
    (time.num_seconds_from_midnight() as i64 * TICKS_PER_SECOND
        + (nanos / NANOS_PER_TICK) as i64) as i32
}

/// Decode ticks since midnight into a time of day
pub fn decode_time(ticks: i32) -> Result<NaiveTime> {
    if ticks < 0 {
        return Err(Error::DataConversion(format!(
            "time value {} out of range",
            ticks
        )));
    }
    let ticks = ticks as i64;
    let secs = (ticks / TICKS_PER_SECOND) as u32;
    let nanos = (ticks % TICKS_PER_SECOND) as u32 * NANOS_PER_TICK;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
        .ok_or_else(|| Error::DataConversion(format!("time value {} out of range", ticks)))
}

/// Encode a timestamp as its (date, time) word pair
pub fn encode_timestamp(ts: NaiveDateTime) -> (i32, i32) {
    (encode_date(ts.date()), encode_time(ts.time()))
}

/// Decode a (date, time) word pair
pub fn decode_timestamp(date: i32, time: i32) -> Result<NaiveDateTime> {
    Ok(NaiveDateTime::new(decode_date(date)?, decode_time(time)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_epoch_is_day_zero() {
        assert_eq!(encode_date(ymd(1858, 11, 17)), 0);
        assert_eq!(decode_date(0).unwrap(), ymd(1858, 11, 17));
        assert_eq!(encode_date(ymd(1858, 11, 16)), -1);
    }

    #[test]
    fn test_known_dates() {
        // 2000-01-01 is MJD 51544
        assert_eq!(encode_date(ymd(2000, 1, 1)), 51544);
        assert_eq!(decode_date(51544).unwrap(), ymd(2000, 1, 1));
    }

    #[test]
    fn test_leap_day() {
        let leap = ymd(2024, 2, 29);
        let days = encode_date(leap);
        assert_eq!(decode_date(days).unwrap(), leap);
        assert_eq!(decode_date(days + 1).unwrap(), ymd(2024, 3, 1));
        assert_eq!(decode_date(days - 1).unwrap(), ymd(2024, 2, 28));
    }

    #[test]
    fn test_midnight_and_end_of_day() {
        let midnight = NaiveTime::from_hms_opt(0, 0, 0).unwrap();
        assert_eq!(encode_time(midnight), 0);
        assert_eq!(decode_time(0).unwrap(), midnight);

        let last = NaiveTime::from_hms_micro_opt(23, 59, 59, 999_900).unwrap();
        assert_eq!(encode_time(last), 863_999_999);
        assert_eq!(decode_time(863_999_999).unwrap(), last);
    }

    #[test]
    fn test_time_drops_sub_tick_precision() {
        let t = NaiveTime::from_hms_nano_opt(12, 30, 15, 123_456_789).unwrap();
        let ticks = encode_time(t);
        assert_eq!(ticks, (12 * 3600 + 30 * 60 + 15) * 10_000 + 1234);
        assert_eq!(
            decode_time(ticks).unwrap(),
            NaiveTime::from_hms_micro_opt(12, 30, 15, 123_400).unwrap()
        );
    }

    #[test]
    fn test_invalid_time() {
        assert!(decode_time(-1).is_err());
        assert!(decode_time(864_000_000).is_err());
    }

    #[test]
    fn test_timestamp() {
        let ts = ymd(2024, 2, 29).and_hms_opt(13, 45, 0).unwrap();
        let (d, t) = encode_timestamp(ts);
        assert_eq!(decode_timestamp(d, t).unwrap(), ts);
    }
}
