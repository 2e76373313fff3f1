//! VTIMEZONE synthesis: discover a zone's DST transitions over a year
//! range and collapse them into STANDARD/DAYLIGHT blocks with yearly
//! recurrence rules.
//!
//! Working assumptions, inherited from the data this format describes:
//! transitions occur on the hour, at most twice a year, never in December,
//! never within a month of one another; daylight time moves the offset
//! exactly one hour later; an ambiguous local time reads as the later
//! regime.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Weekday};

use crate::codec;
use crate::core::{Component, DateTimeValue, Value};
use crate::error::{Result, VObjectError};

use super::rules::{ObservanceKind, TimezoneRules, nth_weekday_of_month};
use super::TzSource;

const WEEKDAY_TOKENS: [&str; 7] = ["MO", "TU", "WE", "TH", "FR", "SA", "SU"];

fn weekday_token(weekday: Weekday) -> &'static str {
    WEEKDAY_TOKENS[weekday.num_days_from_monday() as usize]
}

fn jan1(year: i32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, 1, 1)
        .unwrap_or_default()
        .and_hms_opt(0, 0, 0)
        .unwrap_or_default()
}

impl Component {
    /// The timezone defined by this VTIMEZONE, or `None` for empty or
    /// unusable definitions.
    #[must_use]
    pub fn tzinfo(&self) -> Option<TzSource> {
        if self.is_empty() {
            return None;
        }
        match TimezoneRules::from_component(self) {
            Ok(rules) => Some(TzSource::Rules(Arc::new(rules))),
            Err(err) => {
                tracing::error!(error = %err, "cannot read VTIMEZONE");
                None
            }
        }
    }

    /// Replaces this component's contents with a VTIMEZONE definition of
    /// `source`, collapsing DST transitions over `[start_year, end_year]`
    /// into recurrence rules.
    ///
    /// ## Errors
    /// Fails when no TZID can be determined for the zone.
    pub fn set_tzinfo(&mut self, source: &TzSource, start_year: i32, end_year: i32) -> Result<()> {
        let tzid = pick_tzid(source, true)
            .ok_or_else(|| VObjectError::usage("unable to determine a TZID for the timezone"))?;

        self.remove_all("tzid");
        self.remove_all("standard");
        self.remove_all("daylight");
        self.add_line("tzid").value = Value::Raw(tzid);

        let mut completed: [Vec<TransitionRule>; 2] = [Vec::new(), Vec::new()];
        let mut working: [Option<TransitionRule>; 2] = [None, None];
        let kinds = [ObservanceKind::Daylight, ObservanceKind::Standard];

        for year in start_year..=end_year {
            for (slot, kind) in kinds.into_iter().enumerate() {
                let transition = get_transition(kind, year, source);
                match transition {
                    Some(t) if t == jan1(year) => {
                        // This mode is in effect for the whole year.
                        let rule = TransitionRule::all_year(source, t);
                        let keep_old = working[slot]
                            .as_ref()
                            .is_some_and(|old| old.offset == rule.offset);
                        if !keep_old {
                            if let Some(mut old) = working[slot].take() {
                                old.end = Some(year - 1);
                                completed[slot].push(old);
                            }
                            working[slot] = Some(rule);
                        }
                    }
                    None => {
                        if let Some(mut old) = working[slot].take() {
                            old.end = Some(year - 1);
                            completed[slot].push(old);
                        }
                    }
                    Some(t) => {
                        let rule = TransitionRule::at(source, kind, t);
                        let matches = working[slot].as_ref().map(|old| {
                            let plus = rule.plus == old.plus;
                            let minus = rule.minus == old.minus;
                            let holds = (plus || minus)
                                && rule.month == old.month
                                && rule.weekday == old.weekday
                                && rule.hour == old.hour
                                && rule.offset == old.offset;
                            (holds, plus, minus)
                        });
                        match matches {
                            None => working[slot] = Some(rule),
                            Some((true, plus_match, minus_match)) => {
                                if let Some(old) = working[slot].as_mut() {
                                    if !plus_match {
                                        old.plus = None;
                                    }
                                    if !minus_match {
                                        old.minus = None;
                                    }
                                }
                            }
                            Some((false, _, _)) => {
                                if let Some(mut old) = working[slot].take() {
                                    old.end = Some(year - 1);
                                    completed[slot].push(old);
                                }
                                working[slot] = Some(rule);
                            }
                        }
                    }
                }
            }
        }
        for slot in 0..2 {
            if let Some(rule) = working[slot].take() {
                completed[slot].push(rule);
            }
        }

        for (slot, kind) in kinds.into_iter().enumerate() {
            for rule in &completed[slot] {
                let child = self.add_component(kind.as_str());
                child.add_line("dtstart").value =
                    Value::DateTime(DateTimeValue::floating(rule.start));
                if let Some(name) = &rule.name {
                    child.add_line("tzname").value = Value::Text(name.clone());
                }
                child.add_line("tzoffsetto").value =
                    Value::Text(codec::delta_to_offset(rule.offset));
                child.add_line("tzoffsetfrom").value =
                    Value::Text(codec::delta_to_offset(rule.offset_from));
                child.add_line("rrule").value = Value::Raw(rule.rrule_string());
            }
        }
        Ok(())
    }
}

/// One collapsed transition rule covering a run of years.
#[derive(Debug, Clone, PartialEq)]
struct TransitionRule {
    /// Last year this rule applies to, or `None` while still open.
    end: Option<i32>,
    /// The first transition covered by this rule, in local time.
    start: NaiveDateTime,
    month: u32,
    weekday: Option<Weekday>,
    /// Transition hour; `None` for all-year rules.
    hour: Option<u32>,
    name: Option<String>,
    /// nth week of the month, counted from the start.
    plus: Option<i32>,
    /// nth week of the month, counted from the end.
    minus: Option<i32>,
    offset: TimeDelta,
    offset_from: TimeDelta,
}

impl TransitionRule {
    /// A rule for a mode in effect the entire year.
    fn all_year(source: &TzSource, newyear: NaiveDateTime) -> Self {
        let offset = source.utc_offset(newyear, None);
        Self {
            end: None,
            start: newyear,
            month: 1,
            weekday: None,
            hour: None,
            name: source.tzname(newyear, None),
            plus: None,
            minus: None,
            offset,
            offset_from: offset,
        }
    }

    /// A rule for a discovered transition instant.
    fn at(source: &TzSource, kind: ObservanceKind, transition: NaiveDateTime) -> Self {
        let hint = Some(kind);
        Self {
            end: None,
            start: transition,
            month: transition.month(),
            weekday: Some(transition.weekday()),
            hour: Some(chrono::Timelike::hour(&transition)),
            name: source.tzname(transition, hint),
            plus: Some(i32::try_from((transition.day() - 1) / 7 + 1).unwrap_or(1)),
            minus: Some(weeks_from_month_end(transition)),
            offset: source.utc_offset(transition, hint),
            offset_from: source.utc_offset(transition - TimeDelta::hours(2), hint),
        }
    }

    /// `FREQ=YEARLY[;BYDAY=±nWD];BYMONTH=m[;UNTIL=…Z]`.
    fn rrule_string(&self) -> String {
        let ordinal = match (self.plus, self.minus) {
            (Some(n), _) => Some(n),
            (None, Some(n)) => Some(-n),
            (None, None) => None,
        };
        let day_part = match (ordinal, self.weekday) {
            (Some(n), Some(wd)) => format!(";BYDAY={n}{}", weekday_token(wd)),
            _ => String::new(),
        };
        let until_part = self.end.map_or_else(String::new, |end_year| {
            let end_local = match (self.hour, ordinal, self.weekday) {
                (Some(hour), Some(n), Some(wd)) => nth_weekday_of_month(
                    end_year,
                    self.month,
                    wd,
                    n,
                    NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or_default(),
                )
                .unwrap_or_else(|| jan1(end_year)),
                _ => jan1(end_year),
            };
            let end_utc = end_local - self.offset_from;
            format!(
                ";UNTIL={}",
                codec::datetime_to_string(&DateTimeValue::utc(end_utc), false)
            )
        });
        format!("FREQ=YEARLY{day_part};BYMONTH={}{until_part}", self.month)
    }
}

/// How many weeks from the end of its month `dt` falls, starting from 1.
fn weeks_from_month_end(dt: NaiveDateTime) -> i32 {
    let mut n = 1;
    let mut current = dt + TimeDelta::weeks(1);
    while current.month() == dt.month() {
        n += 1;
        current += TimeDelta::weeks(1);
    }
    n
}

/// Whether the zone is in the target mode at a local probe time. A DST gap
/// reads as entering daylight time; a fold as entering standard time.
fn in_mode(source: &TzSource, probe: NaiveDateTime, mode: ObservanceKind) -> bool {
    if let TzSource::Iana(tz) = source {
        use chrono::{LocalResult, TimeZone};
        use chrono_tz::OffsetComponents;
        return match tz.offset_from_local_datetime(&probe) {
            LocalResult::Single(offset) => {
                let dst = offset.dst_offset() != TimeDelta::zero();
                match mode {
                    ObservanceKind::Daylight => dst,
                    ObservanceKind::Standard => !dst,
                }
            }
            LocalResult::None => mode == ObservanceKind::Daylight,
            LocalResult::Ambiguous(..) => mode == ObservanceKind::Standard,
        };
    }
    let dst = source.dst_offset(probe, None) != TimeDelta::zero();
    match mode {
        ObservanceKind::Daylight => dst,
        ObservanceKind::Standard => !dst,
    }
}

/// The last sample not yet in the mode before the first sample that is, or
/// `None` when every sample is already in the mode.
///
/// When no sample ever enters the mode, the last non-matching sample is
/// returned; [`get_transition`] reads a December result as "not in effect".
fn first_transition(
    samples: impl Iterator<Item = NaiveDateTime>,
    test: impl Fn(NaiveDateTime) -> bool,
) -> Option<NaiveDateTime> {
    let mut last_failing = None;
    for sample in samples {
        if test(sample) {
            if last_failing.is_some() {
                return last_failing;
            }
        } else {
            last_failing = Some(sample);
        }
    }
    last_failing
}

/// The local datetime of the year's transition into `mode`, January 1st
/// when the mode is in effect all year, or `None` when it never is.
///
/// The scan narrows month by month, then day by day, then hour by hour;
/// the probe cost is a property of the supplied timezone.
pub(crate) fn get_transition(
    mode: ObservanceKind,
    year: i32,
    source: &TzSource,
) -> Option<NaiveDateTime> {
    let test = |dt: NaiveDateTime| in_mode(source, dt, mode);

    let months = (1..=12).filter_map(move |month| {
        NaiveDate::from_ymd_opt(year, month, 1).map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default())
    });
    let Some(month_dt) = first_transition(months, test) else {
        // Already in the mode on every probe: in effect all year.
        return Some(jan1(year));
    };
    if month_dt.month() == 12 {
        return None;
    }

    let month = month_dt.month();
    let days = (1..=31).filter_map(move |day| {
        NaiveDate::from_ymd_opt(year, month, day).map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default())
    });
    let day = first_transition(days, test)?.day();

    let hours = (0..24).filter_map(move |hour| {
        NaiveDate::from_ymd_opt(year, month, day).and_then(|d| d.and_hms_opt(hour, 0, 0))
    });
    let uncorrected = first_transition(hours, test)?;

    // The probe found the hour before the transition; standard transitions
    // also absorb the hour the clock repeats.
    let correction = match mode {
        ObservanceKind::Standard => 2,
        ObservanceKind::Daylight => 1,
    };
    Some(uncorrected + TimeDelta::hours(correction))
}

/// Compares two zones by offsets and DST transitions over a year range.
#[must_use]
pub fn tzinfo_eq(a: &TzSource, b: &TzSource, start_year: i32, end_year: i32) -> bool {
    if a == b {
        return true;
    }
    let offsets_match =
        |dt: NaiveDateTime| a.utc_offset(dt, None) == b.utc_offset(dt, None);
    if !offsets_match(jan1(start_year)) {
        return false;
    }
    for year in start_year..end_year {
        for mode in [ObservanceKind::Daylight, ObservanceKind::Standard] {
            let t1 = get_transition(mode, year, a);
            let t2 = get_transition(mode, year, b);
            if t1 != t2 {
                return false;
            }
            if let Some(t) = t1
                && !offsets_match(t)
            {
                return false;
            }
        }
    }
    true
}

/// Determines the TZID for a timezone; `None` for UTC-equivalent zones
/// unless `allow_utc` is set.
#[must_use]
pub fn pick_tzid(source: &TzSource, allow_utc: bool) -> Option<String> {
    if !allow_utc && tzinfo_eq(source, &TzSource::Utc, 2000, 2020) {
        return None;
    }
    match source {
        TzSource::Utc => Some("UTC".to_string()),
        TzSource::Iana(tz) => Some(tz.name().to_string()),
        TzSource::Rules(rules) => Some(rules.tzid.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Tz;

    fn eastern() -> TzSource {
        TzSource::Iana("US/Eastern".parse::<Tz>().unwrap())
    }

    fn naive(y: i32, mo: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn eastern_transitions_2000() {
        let tz = eastern();
        assert_eq!(
            get_transition(ObservanceKind::Daylight, 2000, &tz),
            Some(naive(2000, 4, 2, 2))
        );
        assert_eq!(
            get_transition(ObservanceKind::Standard, 2000, &tz),
            Some(naive(2000, 10, 29, 2))
        );
    }

    #[test]
    fn eastern_transitions_2007_rule_change() {
        let tz = eastern();
        assert_eq!(
            get_transition(ObservanceKind::Daylight, 2007, &tz),
            Some(naive(2007, 3, 11, 2))
        );
        assert_eq!(
            get_transition(ObservanceKind::Standard, 2007, &tz),
            Some(naive(2007, 11, 4, 2))
        );
    }

    #[test]
    fn utc_has_no_daylight() {
        let tz = TzSource::Utc;
        assert_eq!(get_transition(ObservanceKind::Daylight, 2006, &tz), None);
        assert_eq!(
            get_transition(ObservanceKind::Standard, 2006, &tz),
            Some(jan1(2006))
        );
    }

    #[test]
    fn tzinfo_eq_detects_equivalence() {
        assert!(tzinfo_eq(&TzSource::Utc, &TzSource::Utc, 2000, 2005));
        let utc_alias = TzSource::Iana("Etc/UTC".parse::<Tz>().unwrap());
        assert!(tzinfo_eq(&TzSource::Utc, &utc_alias, 2000, 2005));
        assert!(!tzinfo_eq(&TzSource::Utc, &eastern(), 2000, 2005));
    }

    #[test]
    fn pick_tzid_variants() {
        assert_eq!(pick_tzid(&TzSource::Utc, true).as_deref(), Some("UTC"));
        assert_eq!(pick_tzid(&TzSource::Utc, false), None);
        assert_eq!(pick_tzid(&eastern(), false).as_deref(), Some("US/Eastern"));
    }

    #[test]
    fn synthesized_eastern_has_four_rules() {
        let mut comp = Component::new("VTIMEZONE");
        comp.behavior = crate::behavior::get_behavior("VTIMEZONE", None);
        comp.set_tzinfo(&eastern(), 2000, 2030).unwrap();

        assert_eq!(comp.child_text("tzid"), Some("US/Eastern"));
        assert_eq!(comp.children("standard").len(), 2);
        assert_eq!(comp.children("daylight").len(), 2);

        let first_std = comp.children("standard")[0].as_component().unwrap();
        assert_eq!(
            first_std.child_text("rrule"),
            Some("FREQ=YEARLY;BYDAY=-1SU;BYMONTH=10;UNTIL=20061029T060000Z")
        );
        assert_eq!(first_std.child_text("tzname"), Some("EST"));
        assert_eq!(first_std.child_text("tzoffsetto"), Some("-0500"));
        assert_eq!(first_std.child_text("tzoffsetfrom"), Some("-0400"));

        let second_dl = comp.children("daylight")[1].as_component().unwrap();
        assert_eq!(
            second_dl.child_text("rrule"),
            Some("FREQ=YEARLY;BYDAY=2SU;BYMONTH=3")
        );
    }

    #[test]
    fn fixed_offset_zone_synthesizes_all_year_standard() {
        let kolkata = TzSource::Iana("Asia/Kolkata".parse::<Tz>().unwrap());
        let mut comp = Component::new("VTIMEZONE");
        comp.behavior = crate::behavior::get_behavior("VTIMEZONE", None);
        comp.set_tzinfo(&kolkata, 2000, 2010).unwrap();
        assert_eq!(comp.children("standard").len(), 1);
        assert!(comp.children("daylight").is_empty());
        let std = comp.children("standard")[0].as_component().unwrap();
        assert_eq!(std.child_text("tzoffsetto"), Some("+0530"));
        assert_eq!(std.child_text("rrule"), Some("FREQ=YEARLY;BYMONTH=1"));
    }
}
