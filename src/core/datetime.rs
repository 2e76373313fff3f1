//! Date-time and period values for the vObject data model.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

/// Zone attachment of a DATE-TIME value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Zone {
    /// No timezone information: interpreted in the observer's local zone.
    Floating,
    /// Coordinated Universal Time (a trailing `Z` on the wire).
    Utc,
    /// A named timezone, resolved through the TZID registry.
    Tzid(String),
}

impl Zone {
    /// Returns the TZID string, if this is a named zone.
    #[must_use]
    pub fn tzid(&self) -> Option<&str> {
        match self {
            Self::Tzid(id) => Some(id),
            Self::Floating | Self::Utc => None,
        }
    }
}

/// A DATE-TIME value: a wall-clock instant plus its zone attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateTimeValue {
    /// The wall-clock date and time, as written.
    pub naive: NaiveDateTime,
    /// How the wall-clock reading relates to UTC.
    pub zone: Zone,
}

impl DateTimeValue {
    /// Creates a floating date-time.
    #[must_use]
    pub fn floating(naive: NaiveDateTime) -> Self {
        Self {
            naive,
            zone: Zone::Floating,
        }
    }

    /// Creates a UTC date-time.
    #[must_use]
    pub fn utc(naive: NaiveDateTime) -> Self {
        Self {
            naive,
            zone: Zone::Utc,
        }
    }

    /// Creates a date-time in a named zone.
    #[must_use]
    pub fn zoned(naive: NaiveDateTime, tzid: impl Into<String>) -> Self {
        Self {
            naive,
            zone: Zone::Tzid(tzid.into()),
        }
    }

    /// Promotes a date to a floating date-time at midnight.
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        Self::floating(date.and_hms_opt(0, 0, 0).unwrap_or_default())
    }

    /// Whether this value has no zone attachment.
    #[must_use]
    pub fn is_floating(&self) -> bool {
        matches!(self.zone, Zone::Floating)
    }

    /// Whether this value is in UTC.
    #[must_use]
    pub fn is_utc(&self) -> bool {
        matches!(self.zone, Zone::Utc)
    }

    /// The TZID, if the value is in a named zone.
    #[must_use]
    pub fn tzid(&self) -> Option<&str> {
        self.zone.tzid()
    }
}

/// The end of a PERIOD value: an explicit end instant or a duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeriodEnd {
    /// `start/end` form.
    DateTime(DateTimeValue),
    /// `start/duration` form.
    Duration(TimeDelta),
}

/// A PERIOD value (`start/end` or `start/duration`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Period {
    /// Start of the period.
    pub start: DateTimeValue,
    /// End instant or duration.
    pub end: PeriodEnd,
}

impl Period {
    /// Creates a period from a start and a duration.
    #[must_use]
    pub fn with_duration(start: DateTimeValue, duration: TimeDelta) -> Self {
        Self {
            start,
            end: PeriodEnd::Duration(duration),
        }
    }

    /// Creates a period from explicit start and end instants.
    #[must_use]
    pub fn with_end(start: DateTimeValue, end: DateTimeValue) -> Self {
        Self {
            start,
            end: PeriodEnd::DateTime(end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_date_is_midnight_floating() {
        let date = NaiveDate::from_ymd_opt(2006, 5, 9).unwrap();
        let dt = DateTimeValue::from_date(date);
        assert!(dt.is_floating());
        assert_eq!(dt.naive, date.and_hms_opt(0, 0, 0).unwrap());
    }

    #[test]
    fn tzid_accessor() {
        let naive = NaiveDate::from_ymd_opt(2006, 5, 9)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let dt = DateTimeValue::zoned(naive, "US/Eastern");
        assert_eq!(dt.tzid(), Some("US/Eastern"));
        assert!(!dt.is_utc());
    }
}
