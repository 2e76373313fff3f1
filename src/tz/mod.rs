//! Timezone engine: the process-wide TZID registry, zone sources, and
//! VTIMEZONE synthesis.

mod rules;
mod synthesize;

pub use rules::{Observance, ObservanceKind, TimezoneRules, UtcOffset};
pub use synthesize::{pick_tzid, tzinfo_eq};

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, LazyLock, Mutex};

use chrono::{LocalResult, NaiveDateTime, Offset, TimeZone, TimeDelta};
use chrono_tz::{OffsetComponents, OffsetName, Tz};

use crate::core::{Component, DateTimeValue, Zone};

/// First year of the default VTIMEZONE synthesis range.
pub const DEFAULT_START_YEAR: i32 = 2000;
/// Last year of the default VTIMEZONE synthesis range.
pub const DEFAULT_END_YEAR: i32 = 2030;

/// A timezone usable by the engine: UTC, an IANA database zone, or rules
/// extracted from an embedded VTIMEZONE.
#[derive(Debug, Clone)]
pub enum TzSource {
    /// Coordinated Universal Time.
    Utc,
    /// A zone from the bundled IANA database.
    Iana(Tz),
    /// Rules read out of a VTIMEZONE component.
    Rules(Arc<TimezoneRules>),
}

impl PartialEq for TzSource {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Utc, Self::Utc) => true,
            (Self::Iana(a), Self::Iana(b)) => a == b,
            (Self::Rules(a), Self::Rules(b)) => Arc::ptr_eq(a, b) || a == b,
            _ => false,
        }
    }
}

impl TzSource {
    /// The total UTC offset at a local wall-clock time.
    ///
    /// `hint` disambiguates times inside a DST gap or fold: a daylight hint
    /// reads them as daylight time, a standard hint as standard time, and
    /// no hint resolves to the later regime.
    #[must_use]
    pub fn utc_offset(&self, local: NaiveDateTime, hint: Option<ObservanceKind>) -> TimeDelta {
        match self {
            Self::Utc => TimeDelta::zero(),
            Self::Iana(tz) => iana_offset(*tz, local, hint).map_or_else(TimeDelta::zero, |o| {
                TimeDelta::seconds(i64::from(o.fix().local_minus_utc()))
            }),
            Self::Rules(rules) => rules.offset_at(local).as_delta(),
        }
    }

    /// The DST portion of the offset at a local wall-clock time.
    #[must_use]
    pub fn dst_offset(&self, local: NaiveDateTime, hint: Option<ObservanceKind>) -> TimeDelta {
        match self {
            Self::Utc => TimeDelta::zero(),
            Self::Iana(tz) => {
                iana_offset(*tz, local, hint).map_or_else(TimeDelta::zero, |o| o.dst_offset())
            }
            Self::Rules(rules) => rules.dst_at(local),
        }
    }

    /// The zone abbreviation at a local wall-clock time.
    #[must_use]
    pub fn tzname(&self, local: NaiveDateTime, hint: Option<ObservanceKind>) -> Option<String> {
        match self {
            Self::Utc => Some("UTC".to_string()),
            Self::Iana(tz) => {
                iana_offset(*tz, local, hint).and_then(|o| o.abbreviation().map(str::to_string))
            }
            Self::Rules(rules) => rules.name_at(local),
        }
    }

    /// Converts a local wall-clock time in this zone to naive UTC.
    #[must_use]
    pub fn to_utc(&self, local: NaiveDateTime) -> NaiveDateTime {
        local - self.utc_offset(local, None)
    }

    /// Converts naive UTC to local wall-clock time in this zone.
    #[must_use]
    pub fn from_utc(&self, utc: NaiveDateTime) -> NaiveDateTime {
        match self {
            Self::Utc => utc,
            Self::Iana(tz) => tz.from_utc_datetime(&utc).naive_local(),
            Self::Rules(rules) => rules.from_utc(utc),
        }
    }
}

/// Resolves an offset for a local time, disambiguating gaps and folds.
fn iana_offset(
    tz: Tz,
    local: NaiveDateTime,
    hint: Option<ObservanceKind>,
) -> Option<<Tz as TimeZone>::Offset> {
    match tz.offset_from_local_datetime(&local) {
        LocalResult::Single(offset) => Some(offset),
        // A fold: the earlier instant is the daylight reading.
        LocalResult::Ambiguous(daylight, standard) => Some(match hint {
            Some(ObservanceKind::Daylight) => daylight,
            _ => standard,
        }),
        // A gap: probe the requested side of the transition.
        LocalResult::None => {
            let shifted = match hint {
                Some(ObservanceKind::Standard) => local - TimeDelta::hours(1),
                _ => local + TimeDelta::hours(1),
            };
            match tz.offset_from_local_datetime(&shifted) {
                LocalResult::Single(offset) | LocalResult::Ambiguous(offset, _) => Some(offset),
                LocalResult::None => None,
            }
        }
    }
}

// ------------------------------------------------------------- registry ----

static TZID_REGISTRY: LazyLock<Mutex<HashMap<String, TzSource>>> = LazyLock::new(|| {
    let mut map = HashMap::new();
    map.insert("UTC".to_string(), TzSource::Utc);
    Mutex::new(map)
});

/// Registers a tzid → timezone mapping.
pub fn register_tzid(tzid: &str, source: TzSource) {
    TZID_REGISTRY
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .insert(tzid.to_string(), source);
}

/// Removes a tzid mapping (used by tests to clear cached state).
pub fn unregister_tzid(tzid: &str) {
    TZID_REGISTRY
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .remove(tzid);
}

/// Looks up a tzid. With `smart`, unknown ids fall back to the IANA
/// database and successful lookups are memoized; failures are logged and
/// return `None`.
#[must_use]
pub fn get_tzid(tzid: &str, smart: bool) -> Option<TzSource> {
    let mut map = TZID_REGISTRY
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    if let Some(source) = map.get(tzid) {
        return Some(source.clone());
    }
    if smart && !tzid.is_empty() {
        match Tz::from_str(tzid) {
            Ok(tz) => {
                let source = TzSource::Iana(tz);
                map.insert(tzid.to_string(), source.clone());
                return Some(source);
            }
            Err(_) => tracing::error!(tzid, "unknown timezone"),
        }
    }
    None
}

/// Converts a date-time value to naive UTC; floating values have no UTC
/// reading and unresolvable TZIDs fall back to treating the wall clock as
/// UTC.
#[must_use]
pub fn to_utc_naive(value: &DateTimeValue) -> Option<NaiveDateTime> {
    match &value.zone {
        Zone::Floating => None,
        Zone::Utc => Some(value.naive),
        Zone::Tzid(tzid) => Some(
            get_tzid(tzid, true)
                .map_or(value.naive, |source| source.to_utc(value.naive)),
        ),
    }
}

/// Registers the timezone defined by a VTIMEZONE component under its TZID,
/// unless that TZID is already registered. Called when a VTIMEZONE becomes
/// native, so recurrences can resolve the zone.
pub fn register_component_tzinfo(comp: &Component) {
    match TimezoneRules::from_component(comp) {
        Ok(rules) => {
            let tzid = rules.tzid.clone();
            if get_tzid(&tzid, false).is_none() {
                register_tzid(&tzid, TzSource::Rules(Arc::new(rules)));
            }
        }
        Err(err) => {
            if !comp.is_empty() {
                tracing::warn!(error = %err, "unusable VTIMEZONE definition");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn naive(y: i32, mo: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn registry_seeds_utc() {
        assert_eq!(get_tzid("UTC", false), Some(TzSource::Utc));
    }

    #[test]
    fn smart_lookup_memoizes_iana_zones() {
        unregister_tzid("America/Chicago");
        assert!(get_tzid("America/Chicago", false).is_none());
        let source = get_tzid("America/Chicago", true).unwrap();
        assert!(matches!(source, TzSource::Iana(_)));
        assert!(get_tzid("America/Chicago", false).is_some());
        unregister_tzid("America/Chicago");
    }

    #[test]
    fn unknown_zone_returns_none() {
        assert!(get_tzid("Not/AZone", true).is_none());
    }

    #[test]
    fn eastern_offsets() {
        let tz: Tz = "US/Eastern".parse().unwrap();
        let source = TzSource::Iana(tz);
        assert_eq!(
            source.utc_offset(naive(2026, 1, 15, 12), None),
            TimeDelta::hours(-5)
        );
        assert_eq!(
            source.utc_offset(naive(2026, 7, 15, 12), None),
            TimeDelta::hours(-4)
        );
        assert_eq!(
            source.dst_offset(naive(2026, 7, 15, 12), None),
            TimeDelta::hours(1)
        );
    }

    #[test]
    fn fold_resolves_to_later_regime_without_hint() {
        // 2006-10-29 01:30 local happened twice in US/Eastern.
        let tz: Tz = "US/Eastern".parse().unwrap();
        let source = TzSource::Iana(tz);
        let folded = naive(2006, 10, 29, 1);
        assert_eq!(source.utc_offset(folded, None), TimeDelta::hours(-5));
        assert_eq!(
            source.utc_offset(folded, Some(ObservanceKind::Daylight)),
            TimeDelta::hours(-4)
        );
    }

    #[test]
    fn to_utc_naive_by_zone() {
        let value = DateTimeValue::utc(naive(2006, 2, 15, 0));
        assert_eq!(to_utc_naive(&value), Some(naive(2006, 2, 15, 0)));
        let floating = DateTimeValue::floating(naive(2006, 2, 15, 0));
        assert_eq!(to_utc_naive(&floating), None);
        let eastern = DateTimeValue::zoned(naive(2006, 1, 15, 12), "US/Eastern");
        assert_eq!(to_utc_naive(&eastern), Some(naive(2006, 1, 15, 17)));
    }
}
