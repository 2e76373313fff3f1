//! Offset rules extracted from a VTIMEZONE component.
//!
//! A [`TimezoneRules`] value answers "what is the UTC offset at this local
//! time" from the component's STANDARD/DAYLIGHT observances, their yearly
//! recurrence rules, and their RDATEs.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Weekday};

use crate::codec;
use crate::core::{Component, ContentLine, Value};
use crate::error::{ParseError, Result, VObjectError};

/// A UTC offset in seconds; positive is east of UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UtcOffset {
    /// Total seconds from UTC.
    pub seconds: i32,
}

impl UtcOffset {
    /// Builds an offset from total seconds.
    #[must_use]
    pub const fn from_seconds(seconds: i32) -> Self {
        Self { seconds }
    }

    /// The offset as a signed duration.
    #[must_use]
    pub fn as_delta(self) -> TimeDelta {
        TimeDelta::seconds(i64::from(self.seconds))
    }

    /// Parses `±HHMM` or `±HHMMSS`.
    ///
    /// ## Errors
    /// Fails on malformed offsets.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let bad = || VObjectError::from(ParseError::new(format!("'{s}' is not a valid UTC offset")));
        if s.len() < 5 {
            return Err(bad());
        }
        let sign = match s.chars().next() {
            Some('+') => 1,
            Some('-') => -1,
            _ => return Err(bad()),
        };
        let rest = &s[1..];
        let hours: i32 = rest.get(0..2).and_then(|h| h.parse().ok()).ok_or_else(bad)?;
        let minutes: i32 = rest.get(2..4).and_then(|m| m.parse().ok()).ok_or_else(bad)?;
        let seconds: i32 = if rest.len() >= 6 {
            rest.get(4..6).and_then(|x| x.parse().ok()).unwrap_or(0)
        } else {
            0
        };
        Ok(Self::from_seconds(
            sign * (hours * 3600 + minutes * 60 + seconds),
        ))
    }
}

impl std::fmt::Display for UtcOffset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.seconds >= 0 { '+' } else { '-' };
        let total = self.seconds.abs();
        let hours = total / 3600;
        let minutes = (total % 3600) / 60;
        let seconds = total % 60;
        if seconds == 0 {
            write!(f, "{sign}{hours:02}{minutes:02}")
        } else {
            write!(f, "{sign}{hours:02}{minutes:02}{seconds:02}")
        }
    }
}

/// STANDARD or DAYLIGHT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObservanceKind {
    /// Standard time.
    Standard,
    /// Daylight saving time.
    Daylight,
}

impl ObservanceKind {
    /// The component name for this observance.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "STANDARD",
            Self::Daylight => "DAYLIGHT",
        }
    }
}

/// One offset observance of a timezone.
#[derive(Debug, Clone, PartialEq)]
pub struct Observance {
    /// Standard or daylight.
    pub kind: ObservanceKind,
    /// Offset in effect during this observance.
    pub offset_to: UtcOffset,
    /// Offset in effect just before this observance starts.
    pub offset_from: UtcOffset,
    /// First transition, in local time.
    pub dtstart: NaiveDateTime,
    /// Yearly recurrence of the transition, when present.
    pub rrule: Option<String>,
    /// Explicit transition dates, when present.
    pub rdates: Vec<NaiveDateTime>,
    /// Abbreviated zone name (e.g. "EST").
    pub tzname: Option<String>,
}

/// Offset rules for one timezone, extracted from a VTIMEZONE.
#[derive(Debug, Clone, PartialEq)]
pub struct TimezoneRules {
    /// The timezone identifier.
    pub tzid: String,
    /// Observances in document order.
    pub observances: Vec<Observance>,
}

impl TimezoneRules {
    /// Extracts rules from a VTIMEZONE component, reading only the known
    /// child properties (dtstart, rrule, rdate, tzname, tzoffsetfrom,
    /// tzoffsetto, tzid).
    ///
    /// ## Errors
    /// Fails when TZID, an offset, or a DTSTART is missing or malformed.
    pub fn from_component(comp: &Component) -> Result<Self> {
        let tzid = comp
            .child_text("tzid")
            .ok_or_else(|| VObjectError::from(ParseError::new("VTIMEZONE without a TZID")))?
            .to_string();

        let mut observances = Vec::new();
        for (key, kind) in [
            ("standard", ObservanceKind::Standard),
            ("daylight", ObservanceKind::Daylight),
        ] {
            for node in comp.children(key) {
                let Some(child) = node.as_component() else {
                    continue;
                };
                observances.push(Self::observance_from(child, kind)?);
            }
        }
        if observances.is_empty() {
            return Err(ParseError::new(format!(
                "VTIMEZONE {tzid} has no STANDARD or DAYLIGHT observance"
            ))
            .into());
        }
        Ok(Self { tzid, observances })
    }

    fn observance_from(comp: &Component, kind: ObservanceKind) -> Result<Observance> {
        let missing = |what: &str| {
            VObjectError::from(ParseError::new(format!(
                "{} observance is missing {what}",
                kind.as_str()
            )))
        };
        let dtstart = comp
            .line("dtstart")
            .and_then(line_naive)
            .ok_or_else(|| missing("DTSTART"))?;
        let offset_to = UtcOffset::parse(
            comp.child_text("tzoffsetto")
                .ok_or_else(|| missing("TZOFFSETTO"))?,
        )?;
        let offset_from = UtcOffset::parse(
            comp.child_text("tzoffsetfrom")
                .ok_or_else(|| missing("TZOFFSETFROM"))?,
        )?;
        let rrule = comp.child_text("rrule").map(str::to_string);
        let mut rdates = Vec::new();
        for node in comp.children("rdate") {
            if let Some(line) = node.as_line() {
                rdates.extend(line_naive_list(line));
            }
        }
        let tzname = comp.child_text("tzname").map(str::to_string);
        Ok(Observance {
            kind,
            offset_to,
            offset_from,
            dtstart,
            rrule,
            rdates,
            tzname,
        })
    }

    /// The observance in effect at a local time, preferring the latest
    /// transition at or before it. Ambiguous local times resolve to the
    /// later regime.
    #[must_use]
    pub fn observance_at(&self, local: NaiveDateTime) -> Option<&Observance> {
        let mut best: Option<(&Observance, NaiveDateTime)> = None;
        for obs in &self.observances {
            if let Some(effective) = self.effective_date(obs, local) {
                match &best {
                    Some((_, best_dt)) if effective <= *best_dt => {}
                    _ => best = Some((obs, effective)),
                }
            }
        }
        best.map(|(obs, _)| obs)
    }

    /// The UTC offset at a local time. Before any observance applies, the
    /// earliest observance's `offset_from` is used.
    #[must_use]
    pub fn offset_at(&self, local: NaiveDateTime) -> UtcOffset {
        match self.observance_at(local) {
            Some(obs) => obs.offset_to,
            None => self
                .observances
                .iter()
                .min_by_key(|o| o.dtstart)
                .map_or(UtcOffset::from_seconds(0), |o| o.offset_from),
        }
    }

    /// The DST portion of the offset at a local time (zero in standard
    /// time, the standard-to-daylight delta otherwise).
    #[must_use]
    pub fn dst_at(&self, local: NaiveDateTime) -> TimeDelta {
        match self.observance_at(local) {
            Some(obs) if obs.kind == ObservanceKind::Daylight => {
                obs.offset_to.as_delta() - obs.offset_from.as_delta()
            }
            _ => TimeDelta::zero(),
        }
    }

    /// The zone abbreviation at a local time.
    #[must_use]
    pub fn name_at(&self, local: NaiveDateTime) -> Option<String> {
        self.observance_at(local).and_then(|o| o.tzname.clone())
    }

    /// Converts a local time in this zone to naive UTC.
    #[must_use]
    pub fn to_utc(&self, local: NaiveDateTime) -> NaiveDateTime {
        local - self.offset_at(local).as_delta()
    }

    /// Converts naive UTC to local time in this zone.
    #[must_use]
    pub fn from_utc(&self, utc: NaiveDateTime) -> NaiveDateTime {
        let approx = utc + self.offset_at(utc).as_delta();
        utc + self.offset_at(approx).as_delta()
    }

    /// The latest effective date of an observance at or before `at`.
    ///
    /// Transition times are written in the pre-transition local frame; when
    /// the offset decreases, the repeated hour is read as the later regime,
    /// so the observance takes effect one fold early.
    fn effective_date(&self, obs: &Observance, at: NaiveDateTime) -> Option<NaiveDateTime> {
        let fold = (obs.offset_to.as_delta() - obs.offset_from.as_delta()).min(TimeDelta::zero());
        let horizon = at - fold;
        if horizon < obs.dtstart {
            return None;
        }
        let mut best = obs.dtstart;
        for rdate in &obs.rdates {
            if *rdate <= horizon && *rdate > best {
                best = *rdate;
            }
        }
        if let Some(rrule) = &obs.rrule
            && let Some(occurrence) = rrule_occurrence_before(obs, rrule, horizon)
            && occurrence > best
        {
            best = occurrence;
        }
        Some(best)
    }
}

/// The most recent occurrence of a `FREQ=YEARLY;BYMONTH=…;BYDAY=…` rule at
/// or before `at`. Other rule shapes are not used by timezone definitions.
fn rrule_occurrence_before(
    obs: &Observance,
    rrule: &str,
    at: NaiveDateTime,
) -> Option<NaiveDateTime> {
    let mut freq = None;
    let mut bymonth = None;
    let mut byday = None;
    let mut until = None;
    for part in rrule.split(';') {
        let (key, value) = part.split_once('=')?;
        match key.to_ascii_uppercase().as_str() {
            "FREQ" => freq = Some(value.to_ascii_uppercase()),
            "BYMONTH" => bymonth = value.parse::<u32>().ok(),
            "BYDAY" => byday = Some(value.to_string()),
            "UNTIL" => until = codec::parse_datetime(value, None).ok().map(|v| v.naive),
            _ => {}
        }
    }
    if freq.as_deref() != Some("YEARLY") {
        return None;
    }
    let (ordinal, weekday) = parse_byday(byday.as_deref()?)?;
    let month = bymonth?;

    let mut best = None;
    for year in obs.dtstart.year()..=at.year() {
        if let Some(occurrence) =
            nth_weekday_of_month(year, month, weekday, ordinal, obs.dtstart.time())
            && occurrence <= at
            && until.is_none_or(|u| occurrence <= u)
            && best.is_none_or(|b| occurrence > b)
        {
            best = Some(occurrence);
        }
    }
    best
}

/// Parses a BYDAY token like `1SU`, `-1SU`, `2MO`.
pub(crate) fn parse_byday(s: &str) -> Option<(i32, Weekday)> {
    let s = s.trim();
    if s.len() < 2 {
        return None;
    }
    let split = s.len() - 2;
    let ordinal = if s[..split].is_empty() {
        0
    } else {
        s[..split].parse().ok()?
    };
    let weekday = match s[split..].to_ascii_uppercase().as_str() {
        "SU" => Weekday::Sun,
        "MO" => Weekday::Mon,
        "TU" => Weekday::Tue,
        "WE" => Weekday::Wed,
        "TH" => Weekday::Thu,
        "FR" => Weekday::Fri,
        "SA" => Weekday::Sat,
        _ => return None,
    };
    Some((ordinal, weekday))
}

/// The nth occurrence of a weekday in a month; negative counts from the
/// end (`-1` = last).
pub(crate) fn nth_weekday_of_month(
    year: i32,
    month: u32,
    weekday: Weekday,
    ordinal: i32,
    time: NaiveTime,
) -> Option<NaiveDateTime> {
    if ordinal == 0 {
        return None;
    }
    let date = if ordinal > 0 {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let until_target = (i64::from(weekday.num_days_from_monday())
            - i64::from(first.weekday().num_days_from_monday())
            + 7)
            % 7;
        let day = 1 + until_target + i64::from(ordinal - 1) * 7;
        NaiveDate::from_ymd_opt(year, month, u32::try_from(day).ok()?)?
    } else {
        let (next_year, next_month) = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };
        let last = NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()?;
        let back = (i64::from(last.weekday().num_days_from_monday())
            - i64::from(weekday.num_days_from_monday())
            + 7)
            % 7;
        let day = i64::from(last.day()) - back + i64::from(ordinal + 1) * 7;
        if day < 1 {
            return None;
        }
        NaiveDate::from_ymd_opt(year, month, u32::try_from(day).ok()?)?
    };
    Some(NaiveDateTime::new(date, time))
}

/// A line's value as a naive date-time, whether native or still text.
fn line_naive(line: &ContentLine) -> Option<NaiveDateTime> {
    match &line.value {
        Value::DateTime(dt) => Some(dt.naive),
        Value::Date(d) => d.and_hms_opt(0, 0, 0),
        Value::Raw(s) | Value::Text(s) => codec::parse_datetime(s, None)
            .map(|v| v.naive)
            .or_else(|_| codec::parse_date(s).map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default()))
            .ok(),
        _ => None,
    }
}

/// A line's values as naive date-times (RDATE may hold several).
fn line_naive_list(line: &ContentLine) -> Vec<NaiveDateTime> {
    match &line.value {
        Value::DateTimeList(list) => list.iter().map(|v| v.naive).collect(),
        Value::DateList(list) => list
            .iter()
            .filter_map(|d| d.and_hms_opt(0, 0, 0))
            .collect(),
        Value::DateTime(dt) => vec![dt.naive],
        Value::Raw(s) | Value::Text(s) => s
            .split(',')
            .filter_map(|x| codec::parse_datetime(x, None).ok())
            .map(|v| v.naive)
            .collect(),
        _ => Vec::new(),
    }
}
