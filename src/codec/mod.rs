//! Scalar value codecs: text escapes, dates, durations, periods, offsets,
//! base64, and quoted-printable.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta};

use crate::core::{DateTimeValue, Period, PeriodEnd, Zone};
use crate::error::{ParseError, Result, VObjectError};
use crate::tz;

/// Characters recognized after a backslash. DQUOTE is included to cope with
/// producers that escape it even though RFC 5545 TEXT does not allow that.
pub const ESCAPABLE_CHARS: &str = "\\;,Nn\"";

/// Splits `s` on `separator` while expanding backslash escapes.
///
/// `escapable` limits which characters are recognized after a backslash;
/// unrecognized escape sequences are left intact for later passes.
#[must_use]
pub fn unescape_text_values(s: &str, separator: char, escapable: &str) -> Vec<String> {
    let mut results = Vec::new();
    let mut current = String::new();
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(esc) if escapable.contains(esc) => {
                    if esc == 'n' || esc == 'N' {
                        current.push('\n');
                    } else {
                        current.push(esc);
                    }
                }
                Some(other) => {
                    current.push('\\');
                    current.push(other);
                }
                None => current.push('\\'),
            }
        } else if c == separator {
            results.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() || results.is_empty() {
        results.push(current);
    }
    results
}

/// Unescapes a single text value with the full escape set.
#[must_use]
pub fn unescape_text(s: &str) -> String {
    unescape_text_values(s, ',', ESCAPABLE_CHARS)
        .into_iter()
        .next()
        .unwrap_or_default()
}

/// Backslash-escapes `\`, `;`, `,` and folds any newline flavor into `\n`.
#[must_use]
pub fn backslash_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push_str("\\n");
            }
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

// ---------------------------------------------------------------- dates ----

/// Parses a `YYYYMMDD` DATE value.
///
/// ## Errors
/// Fails on anything but eight digits forming a valid date.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let bad = || VObjectError::from(ParseError::new(format!("'{s}' is not a valid DATE")));
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    let year: i32 = s[0..4].parse().map_err(|_| bad())?;
    let month: u32 = s[4..6].parse().map_err(|_| bad())?;
    let day: u32 = s[6..8].parse().map_err(|_| bad())?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(bad)
}

/// Formats a DATE as `YYYYMMDD`.
#[must_use]
pub fn date_to_string(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Parses a `YYYYMMDDTHHMMSS[Z]` DATE-TIME value.
///
/// A trailing `Z` means UTC regardless of parameters. Otherwise, a `tzid`
/// that resolves through the TZID registry attaches that zone; a `tzid`
/// that does not resolve (or none at all) yields a floating value.
///
/// ## Errors
/// Fails when the first fifteen characters are not a well-formed date-time.
pub fn parse_datetime(s: &str, tzid: Option<&str>) -> Result<DateTimeValue> {
    let bad = || VObjectError::from(ParseError::new(format!("'{s}' is not a valid DATE-TIME")));
    let head = s.get(..15).ok_or_else(bad)?;
    let mut naive = NaiveDateTime::parse_from_str(head, "%Y%m%dT%H%M%S").map_err(|_| bad())?;
    // Some producers write year 0000; read it as 2000.
    if naive.year() == 0 {
        naive = naive.with_year(2000).ok_or_else(bad)?;
    }
    if s.len() > 15 && s.as_bytes()[15] == b'Z' {
        return Ok(DateTimeValue::utc(naive));
    }
    let zone = match tzid {
        Some(id) => match tz::get_tzid(id, true) {
            Some(tz::TzSource::Utc) => Zone::Utc,
            Some(_) => Zone::Tzid(id.to_string()),
            None => Zone::Floating,
        },
        None => Zone::Floating,
    };
    Ok(DateTimeValue { naive, zone })
}

/// Formats a DATE-TIME; with `convert_to_utc` zoned values are converted
/// first. A trailing `Z` is emitted for UTC values.
#[must_use]
pub fn datetime_to_string(value: &DateTimeValue, convert_to_utc: bool) -> String {
    let (naive, is_utc) = if convert_to_utc && !value.is_floating() {
        (tz::to_utc_naive(value).unwrap_or(value.naive), true)
    } else {
        (value.naive, value.is_utc())
    };
    let mut out = naive.format("%Y%m%dT%H%M%S").to_string();
    if is_utc {
        out.push('Z');
    }
    out
}

/// Formats a date or date-time value by shape.
#[must_use]
pub fn time_to_string(value: &DateTimeValue) -> String {
    datetime_to_string(value, false)
}

// ------------------------------------------------------------- durations ----

/// Whether the string looks like a DURATION (a `P` within the first two
/// characters).
#[must_use]
pub fn is_duration(s: &str) -> bool {
    s.get(..2)
        .unwrap_or(s)
        .to_ascii_uppercase()
        .contains('P')
}

/// Parses one or more comma-separated DURATION strings.
///
/// ## Errors
/// Fails on empty chunks or chunks with no recognizable fields.
pub fn parse_durations(s: &str) -> Result<Vec<TimeDelta>> {
    s.split(',')
        .map(str::trim)
        .map(parse_single_duration)
        .collect()
}

fn parse_single_duration(s: &str) -> Result<TimeDelta> {
    let bad = || VObjectError::from(ParseError::new(format!("invalid duration string: '{s}'")));
    let mut chars = s.chars().peekable();
    let negative = match chars.peek() {
        Some('-') => {
            chars.next();
            true
        }
        Some('+') => {
            chars.next();
            false
        }
        _ => false,
    };

    let mut delta = TimeDelta::zero();
    let mut number = String::new();
    let mut seen_field = false;
    for c in chars {
        if c.is_ascii_digit() {
            number.push(c);
            continue;
        }
        match c.to_ascii_uppercase() {
            'P' | 'T' => {
                if !number.is_empty() {
                    return Err(bad());
                }
            }
            unit @ ('W' | 'D' | 'H' | 'M' | 'S') => {
                let n: i64 = number.parse().map_err(|_| bad())?;
                number.clear();
                seen_field = true;
                delta += match unit {
                    'W' => TimeDelta::weeks(n),
                    'D' => TimeDelta::days(n),
                    'H' => TimeDelta::hours(n),
                    'M' => TimeDelta::minutes(n),
                    _ => TimeDelta::seconds(n),
                };
            }
            _ => return Err(bad()),
        }
    }
    if !number.is_empty() || !seen_field {
        return Err(bad());
    }
    Ok(if negative { -delta } else { delta })
}

/// Formats a duration as an RFC 5545 DURATION string; zero emits `PT0S`.
#[must_use]
pub fn timedelta_to_string(delta: TimeDelta) -> String {
    let negative = delta < TimeDelta::zero();
    let total = delta.num_seconds().abs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push('P');
    if days != 0 {
        out.push_str(&format!("{days}D"));
    }
    if hours != 0 || minutes != 0 || seconds != 0 {
        out.push('T');
    } else if days == 0 {
        out.push_str("T0S");
    }
    if hours != 0 {
        out.push_str(&format!("{hours}H"));
    }
    if minutes != 0 {
        out.push_str(&format!("{minutes}M"));
    }
    if seconds != 0 {
        out.push_str(&format!("{seconds}S"));
    }
    out
}

// --------------------------------------------------------------- periods ----

/// Parses a PERIOD value: `start/end` where end is a DATE-TIME or DURATION.
///
/// ## Errors
/// Fails when either half does not parse.
pub fn parse_period(s: &str, tzid: Option<&str>) -> Result<Period> {
    let (start_text, end_text) = s
        .split_once('/')
        .ok_or_else(|| VObjectError::from(ParseError::new(format!("'{s}' is not a valid PERIOD"))))?;
    let start = parse_datetime(start_text, tzid)?;
    let end = if is_duration(end_text) {
        PeriodEnd::Duration(
            parse_durations(end_text)?
                .into_iter()
                .next()
                .unwrap_or_else(TimeDelta::zero),
        )
    } else {
        PeriodEnd::DateTime(parse_datetime(end_text, tzid)?)
    };
    Ok(Period { start, end })
}

/// Formats a PERIOD value.
#[must_use]
pub fn period_to_string(period: &Period, convert_to_utc: bool) -> String {
    let start = datetime_to_string(&period.start, convert_to_utc);
    let end = match &period.end {
        PeriodEnd::Duration(d) => timedelta_to_string(*d),
        PeriodEnd::DateTime(dt) => datetime_to_string(dt, convert_to_utc),
    };
    format!("{start}/{end}")
}

// --------------------------------------------------------------- offsets ----

/// Formats a signed offset as `±HHMM`.
#[must_use]
pub fn delta_to_offset(delta: TimeDelta) -> String {
    let sign = if delta < TimeDelta::zero() { '-' } else { '+' };
    let total = delta.num_seconds().abs();
    format!("{sign}{:02}{:02}", total / 3_600, (total % 3_600) / 60)
}

// ---------------------------------------------------------------- base64 ----

/// Decodes base64 content, tolerating embedded whitespace.
///
/// ## Errors
/// Fails on invalid base64.
pub fn decode_base64(s: &str) -> Result<Vec<u8>> {
    let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    BASE64_STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| ParseError::new(format!("invalid base64 data: {e}")).into())
}

/// Encodes binary content as base64 with no embedded newlines.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    BASE64_STANDARD.encode(data)
}

// ------------------------------------------------------- quoted-printable ----

/// Decodes quoted-printable content.
///
/// Soft line breaks (`=` before a newline) are dropped; `=XX` hex pairs
/// become bytes; a malformed `=` is kept literally. The result is read as
/// UTF-8, lossily.
#[must_use]
pub fn decode_quoted_printable(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'=' {
            if i + 1 < bytes.len() && bytes[i + 1] == b'\n' {
                i += 2;
                continue;
            }
            if i + 2 < bytes.len() && bytes[i + 1] == b'\r' && bytes[i + 2] == b'\n' {
                i += 3;
                continue;
            }
            if i + 2 < bytes.len()
                && let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2]))
            {
                out.push(hi * 16 + lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}
