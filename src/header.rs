//! Allocation free rendering of record headers and archive suffixes.
//!
//! Every header looks like `main.rs:42 [I] 2025-04-01 19:55:03.127 - `. Digits
//! are looked up in a table and staged in the record's scratch array, so no
//! integer formatting machinery runs on the logging path.
use {
    crate::{config::Level, policy::Bucket},
    chrono::{DateTime, Datelike, Local, TimeZone, Timelike},
};

/// Size of the scratch array carried by every record. Large enough for a
/// rendered timestamp and for any `u64` in decimal.
pub const SCRATCH_BYTES: usize = 24;

/// File name used when the caller location is unknown.
pub const UNKNOWN_FILE: &str = "???";
/// Line number used when the caller location is unknown.
pub const UNKNOWN_LINE: u32 = 1;

const DIGITS: &[u8; 16] = b"0123456789abcdef";
const TIMESTAMP_BYTES: usize = 23;
const DATE_BYTES: usize = 10;
const DATE_HOUR_BYTES: usize = 13;

/// Wall clock time with millisecond precision, split into calendar fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub millis: u32,
}

impl Timestamp {
    pub fn now() -> Self {
        Self::from_datetime(&Local::now())
    }

    pub fn from_datetime<Tz: TimeZone>(datetime: &DateTime<Tz>) -> Self {
        Timestamp {
            year: datetime.year(),
            month: datetime.month(),
            day: datetime.day(),
            hour: datetime.hour(),
            minute: datetime.minute(),
            second: datetime.second(),
            // leap seconds report nanoseconds above one second
            millis: (datetime.nanosecond() / 1_000_000).min(999),
        }
    }

    pub fn bucket(&self) -> Bucket {
        Bucket::new(self.year, self.month, self.day, self.hour)
    }
}

#[inline]
fn put_two(scratch: &mut [u8], at: usize, value: u32) {
    scratch[at] = DIGITS[(value / 10 % 10) as usize];
    scratch[at + 1] = DIGITS[(value % 10) as usize];
}

#[inline]
fn put_date(scratch: &mut [u8], year: i32, month: u32, day: u32) {
    let year = year.rem_euclid(10_000) as u32;
    put_two(scratch, 0, year / 100);
    put_two(scratch, 2, year % 100);
    scratch[4] = b'-';
    put_two(scratch, 5, month);
    scratch[7] = b'-';
    put_two(scratch, 8, day);
}

/// Render `value` in decimal at the tail of `scratch`, returning the digits.
pub fn render_decimal(scratch: &mut [u8; SCRATCH_BYTES], mut value: u64) -> &[u8] {
    let mut start = SCRATCH_BYTES;
    loop {
        start -= 1;
        scratch[start] = DIGITS[(value % 10) as usize];
        value /= 10;
        if value == 0 || start == 0 {
            break;
        }
    }
    &scratch[start..]
}

/// Render `YYYY-MM-DD` or, with `with_hour`, `YYYY-MM-DD-HH`.
pub fn render_bucket_suffix<'a>(scratch: &'a mut [u8; SCRATCH_BYTES], bucket: &Bucket, with_hour: bool) -> &'a [u8] {
    put_date(scratch, bucket.year, bucket.month, bucket.day);
    if !with_hour {
        return &scratch[..DATE_BYTES];
    }
    scratch[10] = b'-';
    put_two(scratch, 11, bucket.hour);
    &scratch[..DATE_HOUR_BYTES]
}

/// Render `YYYY-MM-DD HH:MM:SS.mmm`.
pub fn render_timestamp<'a>(scratch: &'a mut [u8; SCRATCH_BYTES], timestamp: &Timestamp) -> &'a [u8] {
    put_date(scratch, timestamp.year, timestamp.month, timestamp.day);
    scratch[10] = b' ';
    put_two(scratch, 11, timestamp.hour);
    scratch[13] = b':';
    put_two(scratch, 14, timestamp.minute);
    scratch[16] = b':';
    put_two(scratch, 17, timestamp.second);
    scratch[19] = b'.';
    scratch[20] = DIGITS[(timestamp.millis / 100 % 10) as usize];
    put_two(scratch, 21, timestamp.millis % 100);
    &scratch[..TIMESTAMP_BYTES]
}

/// The last path component of a source file, for either separator.
pub fn basename(file: &str) -> &str {
    file.rsplit(['/', '\\']).next().unwrap_or(file)
}

/// Append `file:line LEVEL timestamp - ` to `buf`.
pub fn render_header(
    buf: &mut Vec<u8>,
    scratch: &mut [u8; SCRATCH_BYTES],
    timestamp: &Timestamp,
    level: Level,
    file: &str,
    line: u32,
) {
    buf.extend_from_slice(basename(file).as_bytes());
    buf.push(b':');
    buf.extend_from_slice(render_decimal(scratch, u64::from(line)));
    buf.push(b' ');
    buf.extend_from_slice(level.marker());
    buf.push(b' ');
    buf.extend_from_slice(render_timestamp(scratch, timestamp));
    buf.extend_from_slice(b" - ");
}

#[cfg(test)]
mod tests {
    use {super::*, chrono::NaiveDate};

    fn timestamp() -> Timestamp {
        Timestamp {
            year: 2020,
            month: 5,
            day: 6,
            hour: 7,
            minute: 40,
            second: 1,
            millis: 37,
        }
    }

    #[test]
    fn renders_full_header() {
        let mut buf = Vec::new();
        let mut scratch = [0u8; SCRATCH_BYTES];
        render_header(&mut buf, &mut scratch, &timestamp(), Level::Warn, "src/net/server.rs", 1207);
        assert_eq!(buf, b"server.rs:1207 [W] 2020-05-06 07:40:01.037 - ");
    }

    #[test]
    fn renders_unknown_caller() {
        let mut buf = Vec::new();
        let mut scratch = [0u8; SCRATCH_BYTES];
        render_header(&mut buf, &mut scratch, &timestamp(), Level::Info, UNKNOWN_FILE, UNKNOWN_LINE);
        assert!(buf.starts_with(b"???:1 [I] "));
    }

    #[test]
    fn renders_decimals_without_leading_zeros() {
        let mut scratch = [0u8; SCRATCH_BYTES];
        assert_eq!(render_decimal(&mut scratch, 0), b"0");
        assert_eq!(render_decimal(&mut scratch, 7), b"7");
        assert_eq!(render_decimal(&mut scratch, 90210), b"90210");
        assert_eq!(render_decimal(&mut scratch, u64::MAX), u64::MAX.to_string().as_bytes());
    }

    #[test]
    fn renders_bucket_suffixes() {
        let mut scratch = [0u8; SCRATCH_BYTES];
        let bucket = Bucket::new(2025, 4, 1, 9);
        assert_eq!(render_bucket_suffix(&mut scratch, &bucket, false), b"2025-04-01");
        assert_eq!(render_bucket_suffix(&mut scratch, &bucket, true), b"2025-04-01-09");
    }

    #[test]
    fn timestamp_from_datetime() {
        let datetime = NaiveDate::from_ymd_opt(2023, 12, 31)
            .and_then(|date| date.and_hms_milli_opt(23, 59, 58, 999))
            .unwrap()
            .and_utc();
        let timestamp = Timestamp::from_datetime(&datetime);
        let mut scratch = [0u8; SCRATCH_BYTES];
        assert_eq!(render_timestamp(&mut scratch, &timestamp), b"2023-12-31 23:59:58.999");
        assert_eq!(timestamp.bucket(), Bucket::new(2023, 12, 31, 23));
    }

    #[test]
    fn basename_handles_both_separators() {
        assert_eq!(basename("a/b/c.rs"), "c.rs");
        assert_eq!(basename(r"a\b\c.rs"), "c.rs");
        assert_eq!(basename("c.rs"), "c.rs");
    }
}
