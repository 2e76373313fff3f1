//! The value of a content line: raw wire text or a typed native value.
//!
//! The on-wire versus native distinction is a sum type rather than a flag:
//! [`Value::Raw`] holds text exactly as it appeared on the wire (escapes
//! intact), the other variants hold decoded or fully native domain values.

use chrono::{NaiveDate, TimeDelta};

use super::datetime::{DateTimeValue, Period};
use super::structured::{Address, Name};

/// A content line's value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// On-wire text, escapes intact.
    Raw(String),
    /// Decoded single text value.
    Text(String),
    /// Decoded multi-valued text.
    TextList(Vec<String>),
    /// Decoded binary data (base64 on the wire).
    Binary(Vec<u8>),
    /// A DATE.
    Date(NaiveDate),
    /// A DATE-TIME.
    DateTime(DateTimeValue),
    /// A list of DATEs (RDATE/EXDATE with `VALUE=DATE`).
    DateList(Vec<NaiveDate>),
    /// A list of DATE-TIMEs.
    DateTimeList(Vec<DateTimeValue>),
    /// A list of PERIODs (FREEBUSY, RDATE with `VALUE=PERIOD`).
    Periods(Vec<Period>),
    /// A DURATION.
    Duration(TimeDelta),
    /// A structured vCard name.
    Name(Name),
    /// A structured vCard address.
    Address(Address),
    /// Organisation levels (vCard ORG).
    Org(Vec<String>),
}

impl Value {
    /// An empty raw value, the state of a freshly created line.
    #[must_use]
    pub fn empty() -> Self {
        Self::Raw(String::new())
    }

    /// Whether the value is still in on-wire form.
    #[must_use]
    pub fn is_raw(&self) -> bool {
        matches!(self, Self::Raw(_))
    }

    /// Whether the value has been transformed into a domain type.
    ///
    /// Decoded text counts as non-native; only typed variants are native.
    #[must_use]
    pub fn is_native(&self) -> bool {
        !matches!(self, Self::Raw(_) | Self::Text(_) | Self::TextList(_))
    }

    /// The raw wire text, if not yet decoded.
    #[must_use]
    pub fn as_raw(&self) -> Option<&str> {
        match self {
            Self::Raw(s) => Some(s),
            _ => None,
        }
    }

    /// The textual content for `Raw` and `Text` variants.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Raw(s) | Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The decoded text list, if present.
    #[must_use]
    pub fn as_text_list(&self) -> Option<&[String]> {
        match self {
            Self::TextList(v) => Some(v),
            _ => None,
        }
    }

    /// The date, if this is a DATE value.
    #[must_use]
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// The date-time, if this is a DATE-TIME value.
    #[must_use]
    pub fn as_datetime(&self) -> Option<&DateTimeValue> {
        match self {
            Self::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    /// The duration, if this is a DURATION value.
    #[must_use]
    pub fn as_duration(&self) -> Option<TimeDelta> {
        match self {
            Self::Duration(d) => Some(*d),
            _ => None,
        }
    }

    /// The period list, if present.
    #[must_use]
    pub fn as_periods(&self) -> Option<&[Period]> {
        match self {
            Self::Periods(p) => Some(p),
            _ => None,
        }
    }

    /// The binary payload, if present.
    #[must_use]
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(b) => Some(b),
            _ => None,
        }
    }

    /// The structured name, if present.
    #[must_use]
    pub fn as_name(&self) -> Option<&Name> {
        match self {
            Self::Name(n) => Some(n),
            _ => None,
        }
    }

    /// The structured address, if present.
    #[must_use]
    pub fn as_address(&self) -> Option<&Address> {
        match self {
            Self::Address(a) => Some(a),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}
