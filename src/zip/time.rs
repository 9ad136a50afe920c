//! Timestamp conversions between the encodings found in ZIP archives.
//!
//! All engine timestamps are milliseconds since the Unix epoch. DOS
//! timestamps are interpreted in the local time zone.

use chrono::{DateTime, Datelike, Local, LocalResult, NaiveDate, TimeZone, Timelike};

/// DOS timestamp of 1980-01-01 00:00:00, the earliest representable value
pub const DOS_EPOCH: u32 = (1 << 21) | (1 << 16);

/// Latest DOS timestamp: 2107-12-31 23:59:58
pub const DOS_MAX: u32 = (127 << 25) | (12 << 21) | (31 << 16) | (23 << 11) | (59 << 5) | 29;

/// Offset of the Windows FILETIME epoch (1601-01-01) in microseconds
const WINDOWS_EPOCH_IN_MICROS: i64 = -11_644_473_600_000_000;

/// Convert a packed DOS date/time (date in the high half) to milliseconds.
pub fn dos_to_millis(dtime: u32) -> i64 {
    let year = ((dtime >> 25) & 0x7f) as i32 + 1980;
    let month = ((dtime >> 21) & 0x0f).max(1);
    let day = ((dtime >> 16) & 0x1f).max(1);
    let hour = (dtime >> 11) & 0x1f;
    let minute = (dtime >> 5) & 0x3f;
    let second = (dtime << 1) & 0x3e;

    let naive = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .or_else(|| NaiveDate::from_ymd_opt(1980, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0)));

    match naive.map(|n| Local.from_local_datetime(&n)) {
        Some(LocalResult::Single(t)) => t.timestamp_millis(),
        Some(LocalResult::Ambiguous(t, _)) => t.timestamp_millis(),
        // Skipped by a DST transition; read it as UTC rather than fail
        Some(LocalResult::None) => naive.map(|n| n.and_utc().timestamp_millis()).unwrap_or(0),
        None => 0,
    }
}

/// Convert milliseconds to a packed DOS date/time, clamping to the DOS range.
pub fn millis_to_dos(millis: i64) -> u32 {
    let Some(utc) = DateTime::from_timestamp_millis(millis) else {
        return if millis < 0 { DOS_EPOCH } else { DOS_MAX };
    };
    let t = utc.with_timezone(&Local);
    let year = t.year();
    if year < 1980 {
        return DOS_EPOCH;
    }
    if year > 2107 {
        return DOS_MAX;
    }
    ((year - 1980) as u32) << 25
        | t.month() << 21
        | t.day() << 16
        | t.hour() << 11
        | t.minute() << 5
        | t.second() >> 1
}

/// Convert a Windows FILETIME (100ns ticks since 1601) to milliseconds.
pub fn win_to_millis(wtime: u64) -> i64 {
    ((wtime / 10) as i64 + WINDOWS_EPOCH_IN_MICROS) / 1000
}

/// Convert milliseconds to a FILETIME, saturating at 1601 and at the
/// largest signed tick count.
pub fn millis_to_win(millis: i64) -> u64 {
    let ticks = millis
        .checked_mul(1000)
        .and_then(|micros| micros.checked_sub(WINDOWS_EPOCH_IN_MICROS))
        .and_then(|micros| micros.checked_mul(10));
    match ticks {
        Some(t) => t.max(0) as u64,
        None if millis < 0 => 0,
        None => i64::MAX as u64,
    }
}

/// Convert signed Unix seconds, as stored in an extended timestamp, to
/// milliseconds.
pub fn unix_to_millis(utime: i32) -> i64 {
    utime as i64 * 1000
}

/// Unix seconds for an extended timestamp, or `None` outside its range.
pub fn millis_to_unix(millis: i64) -> Option<i32> {
    i32::try_from(millis.div_euclid(1000)).ok()
}

/// Current time in milliseconds
pub fn now_millis() -> i64 {
    Local::now().timestamp_millis()
}
