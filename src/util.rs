//! Small utility helpers for URL encoding and time formatting.
//!
//! Intentionally lightweight and dependency-free; used by the HTTP client
//! and the logging setup.

use std::fmt::Write;

/// What: Percent-encode a string for use in URLs according to RFC 3986.
///
/// Inputs:
/// - `input`: String to encode.
///
/// Output:
/// - Percent-encoded string with reserved characters escaped.
///
/// Details:
/// - Unreserved characters (`A-Z`, `a-z`, `0-9`, `-`, `.`, `_`, `~`) pass
///   through; every other byte becomes `%XX` with uppercase hex digits.
#[must_use]
pub fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for &b in input.as_bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
            out.push(b as char);
        } else {
            let _ = write!(out, "%{b:02X}");
        }
    }
    out
}

/// Days in each month for the given leap-ness.
fn month_lengths(leap: bool) -> [i64; 12] {
    [
        31,
        if leap { 29 } else { 28 },
        31,
        30,
        31,
        30,
        31,
        31,
        30,
        31,
        30,
        31,
    ]
}

/// Gregorian leap-year rule.
fn is_leap(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// What: Format a UNIX timestamp as `YYYY-MM-DD HH:MM:SS` (UTC).
///
/// Inputs:
/// - `secs`: Seconds since the epoch; negative values return the raw number.
///
/// Output:
/// - Human-readable UTC timestamp string.
#[must_use]
pub fn epoch_to_datetime(secs: i64) -> String {
    if secs < 0 {
        return secs.to_string();
    }
    let mut days = secs / 86_400;
    let sod = secs % 86_400;
    let (hour, minute, second) = (sod / 3600, (sod % 3600) / 60, sod % 60);

    let mut year: i32 = 1970;
    loop {
        let diy: i64 = if is_leap(year) { 366 } else { 365 };
        if days < diy {
            break;
        }
        days -= diy;
        year += 1;
    }
    let mut month = 1u32;
    for len in month_lengths(is_leap(year)) {
        if days < len {
            break;
        }
        days -= len;
        month += 1;
    }
    let day = days + 1;
    format!("{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}")
}
