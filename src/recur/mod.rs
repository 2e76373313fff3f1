//! Recurrence engine: RRULE parsing and re-materialization, UNTIL
//! reconciliation against DTSTART, and expansion through the `rrule`
//! crate's date iterator.

use chrono::{DateTime, Datelike, NaiveDateTime, Weekday};
use rrule::{Frequency, NWeekday, RRule, RRuleSet, Tz as RRuleTz, Unvalidated};

use crate::codec;
use crate::core::{Component, ContentLine, DateTimeValue, Value, Zone};
use crate::error::{ParseError, Result, VObjectError};
use crate::tz::{self, TzSource};

const WEEKDAY_TOKENS: [&str; 7] = ["MO", "TU", "WE", "TH", "FR", "SA", "SU"];

fn weekday_token(weekday: Weekday) -> &'static str {
    WEEKDAY_TOKENS[weekday.num_days_from_monday() as usize]
}

fn frequency_token(freq: Frequency) -> &'static str {
    match freq {
        Frequency::Yearly => "YEARLY",
        Frequency::Monthly => "MONTHLY",
        Frequency::Weekly => "WEEKLY",
        Frequency::Daily => "DAILY",
        Frequency::Hourly => "HOURLY",
        Frequency::Minutely => "MINUTELY",
        Frequency::Secondly => "SECONDLY",
    }
}

/// An RRULE value as an ordered list of `KEY=VALUE` parts.
///
/// Order is preserved so reconciliation can rewrite UNTIL without
/// disturbing the rest of the rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recur {
    parts: Vec<(String, String)>,
}

impl Recur {
    /// Parses an RRULE string. Backslashes are stripped first: a known
    /// producer illegally escapes the semicolons.
    ///
    /// ## Errors
    /// Fails on parts without `=`.
    pub fn parse(s: &str) -> Result<Self> {
        let cleaned = s.replace('\\', "");
        let mut parts = Vec::new();
        for part in cleaned.split(';').filter(|p| !p.is_empty()) {
            let (key, value) = part.split_once('=').ok_or_else(|| {
                VObjectError::from(ParseError::new(format!("malformed recurrence rule: {s}")))
            })?;
            parts.push((key.to_ascii_uppercase(), value.to_string()));
        }
        Ok(Self { parts })
    }

    /// The value of a rule part.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.parts
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Replaces or appends a rule part.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let key = key.to_ascii_uppercase();
        let value = value.into();
        if let Some(part) = self.parts.iter_mut().find(|(k, _)| *k == key) {
            part.1 = value;
        } else {
            self.parts.push((key, value));
        }
    }

    /// Removes a rule part.
    pub fn remove(&mut self, key: &str) {
        self.parts.retain(|(k, _)| !k.eq_ignore_ascii_case(key));
    }

    /// COUNT as a number, when present.
    #[must_use]
    pub fn count(&self) -> Option<u32> {
        self.get("COUNT").and_then(|v| v.parse().ok())
    }
}

impl std::fmt::Display for Recur {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (key, value) in &self.parts {
            if !first {
                write!(f, ";")?;
            }
            first = false;
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}

/// An expanded rule-set: the `rrule` crate's iterator plus the zone the
/// occurrences should be reported in.
#[derive(Debug, Clone)]
pub struct RecurrenceSet {
    set: RRuleSet,
    zone: Zone,
}

impl RecurrenceSet {
    /// Wraps an existing rule-set; occurrences are reported in `zone`.
    #[must_use]
    pub fn new(set: RRuleSet, zone: Zone) -> Self {
        Self { set, zone }
    }

    /// The underlying rule-set.
    #[must_use]
    pub fn rrule_set(&self) -> &RRuleSet {
        &self.set
    }

    /// Up to `limit` occurrences, in the anchor's zone.
    #[must_use]
    pub fn occurrences(&self, limit: u16) -> Vec<DateTimeValue> {
        self.set
            .clone()
            .all(limit)
            .dates
            .into_iter()
            .map(|dt| self.to_value(dt))
            .collect()
    }

    /// The first occurrence, if any.
    #[must_use]
    pub fn first(&self) -> Option<DateTimeValue> {
        self.occurrences(1).into_iter().next()
    }

    fn to_value(&self, dt: DateTime<RRuleTz>) -> DateTimeValue {
        match &self.zone {
            Zone::Floating => DateTimeValue::floating(dt.naive_local()),
            Zone::Utc => DateTimeValue::utc(dt.with_timezone(&chrono::Utc).naive_utc()),
            Zone::Tzid(id) => DateTimeValue::zoned(dt.naive_local(), id.clone()),
        }
    }
}

impl Component {
    /// The rule-set assembled from this component's RRULE/RDATE/EXRULE/
    /// EXDATE children, anchored at DTSTART (or DUE for a VTODO).
    ///
    /// Equivalent to [`Component::get_rruleset`] without the DTSTART
    /// work-around.
    ///
    /// ## Errors
    /// Fails on malformed rules.
    pub fn rruleset(&self) -> Result<Option<RecurrenceSet>> {
        self.get_rruleset(false)
    }

    /// The rule-set assembled from this component's recurrence children.
    ///
    /// With `add_rdate`, DTSTART is added as an explicit RDATE when the
    /// rules would not otherwise emit it first, and any COUNT is
    /// decremented to preserve caller semantics.
    ///
    /// Returns `None` when the component has no recurrence children or no
    /// usable anchor. Zones without an IANA equivalent expand in UTC.
    ///
    /// ## Errors
    /// Fails on malformed rules.
    pub fn get_rruleset(&self, add_rdate: bool) -> Result<Option<RecurrenceSet>> {
        let has_rules = ["rrule", "rdate", "exrule", "exdate"]
            .iter()
            .any(|name| self.contains(name));
        if !has_rules {
            return Ok(None);
        }
        let Some((anchor, _)) = self.recurrence_anchor() else {
            tracing::error!(component = %self.name, "no DTSTART or DUE to anchor recurrence");
            return Ok(None);
        };

        let (rr_tz, zone) = expansion_zone(&anchor.zone);
        let dt_start = to_rrule_datetime(&anchor, rr_tz);
        let mut set = RRuleSet::new(dt_start.clone());
        let mut add_start_rdate = false;

        for line in self.children("rrule").iter().filter_map(|n| n.as_line()) {
            let (rule, start_needed) = build_rule(line, &anchor, dt_start.clone(), add_rdate)?;
            add_start_rdate |= start_needed;
            set = set.rrule(rule);
        }
        for line in self.children("exrule").iter().filter_map(|n| n.as_line()) {
            let (rule, _) = build_rule(line, &anchor, dt_start.clone(), false)?;
            set = set.exrule(rule);
        }

        let mut first_rdate = None;
        for line in self.children("rdate").iter().filter_map(|n| n.as_line()) {
            for value in date_values(line) {
                let dt = to_rrule_datetime(&value, rr_tz);
                if first_rdate.is_none() {
                    first_rdate = Some(dt.clone());
                }
                set = set.rdate(dt);
            }
        }
        if add_rdate && first_rdate.is_some_and(|dt| dt != dt_start) {
            add_start_rdate = true;
        }
        for line in self.children("exdate").iter().filter_map(|n| n.as_line()) {
            for value in date_values(line) {
                set = set.exdate(to_rrule_datetime(&value, rr_tz));
            }
        }

        if add_start_rdate {
            set = set.rdate(dt_start);
        }
        Ok(Some(RecurrenceSet::new(set, zone)))
    }

    /// Replaces this component's recurrence children with ones matching
    /// the given rule-set.
    ///
    /// RRULE strings are written in canonical field order, suppressing
    /// BYDAY/BYMONTH/BYMONTHDAY values that are implicit from DTSTART.
    ///
    /// ## Errors
    /// Fails when the component has no anchor.
    pub fn set_rruleset(&mut self, rset: &RecurrenceSet) -> Result<()> {
        let (anchor, is_date) = self.recurrence_anchor().ok_or_else(|| {
            VObjectError::usage("cannot set a rule-set on a component without DTSTART or DUE")
        })?;
        let (rr_tz, _) = expansion_zone(&anchor.zone);
        let anchor_dt = to_rrule_datetime(&anchor, rr_tz);

        for name in ["rrule", "exrule", "rdate", "exdate"] {
            self.remove_all(name);
        }

        let rdates: Vec<DateTime<RRuleTz>> = rset
            .set
            .get_rdate()
            .iter()
            .filter(|dt| **dt != anchor_dt)
            .cloned()
            .collect();
        if !rdates.is_empty() {
            self.add_line("rdate").value = date_list_value(&rdates, &anchor.zone, is_date);
        }
        let exdates = rset.set.get_exdate();
        if !exdates.is_empty() {
            self.add_line("exdate").value = date_list_value(exdates, &anchor.zone, is_date);
        }

        for rule in rset.set.get_rrule() {
            self.add_line("rrule").value = Value::Raw(materialize_rule(rule, &anchor, is_date));
        }
        for rule in rset.set.get_exrule() {
            self.add_line("exrule").value = Value::Raw(materialize_rule(rule, &anchor, is_date));
        }
        Ok(())
    }

    /// The recurrence anchor: DTSTART, or DUE for a VTODO. The flag is
    /// true for date-valued anchors.
    fn recurrence_anchor(&self) -> Option<(DateTimeValue, bool)> {
        let line = self.line("dtstart").or_else(|| {
            if self.name == "VTODO" {
                self.line("due")
            } else {
                None
            }
        })?;
        match &line.value {
            Value::DateTime(dt) => Some((dt.clone(), false)),
            Value::Date(d) => Some((DateTimeValue::from_date(*d), true)),
            Value::Raw(s) | Value::Text(s) => {
                let tzid = line.param("TZID");
                codec::parse_datetime(s, tzid)
                    .map(|dt| (dt, false))
                    .or_else(|_| {
                        codec::parse_date(s).map(|d| (DateTimeValue::from_date(d), true))
                    })
                    .ok()
            }
            _ => None,
        }
    }
}

/// Parses, reconciles, and validates one RRULE/EXRULE line. Returns the
/// validated rule and whether DTSTART must be added as an explicit RDATE.
fn build_rule(
    line: &ContentLine,
    anchor: &DateTimeValue,
    dt_start: DateTime<RRuleTz>,
    add_rdate: bool,
) -> Result<(RRule, bool)> {
    let text = line.value.as_text().ok_or_else(|| {
        VObjectError::from(ParseError::new("recurrence rule has no textual value"))
    })?;
    let mut recur = Recur::parse(text)?;
    reconcile_until(&mut recur, anchor)?;

    let rule_error = |e: rrule::RRuleError| {
        VObjectError::from(ParseError {
            message: format!("invalid recurrence rule '{text}': {e}"),
            line_number: line.line_number,
            ..ParseError::default()
        })
    };

    let mut unvalidated: RRule<Unvalidated> =
        recur.to_string().parse().map_err(rule_error)?;
    let mut start_needed = false;
    if add_rdate {
        let probe = unvalidated
            .clone()
            .build(dt_start.clone())
            .map_err(rule_error)?;
        let first = probe.all(1).dates.into_iter().next();
        if first.as_ref() != Some(&dt_start) {
            start_needed = true;
            if let Some(count) = recur.count() {
                recur.set("COUNT", (count.saturating_sub(1)).to_string());
                unvalidated = recur.to_string().parse().map_err(rule_error)?;
            }
        }
    }
    let validated = unvalidated.validate(dt_start).map_err(rule_error)?;
    Ok((validated, start_needed))
}

/// Rewrites UNTIL so it compares correctly against the anchor.
///
/// Floating anchors read UNTIL as floating even when suffixed `Z`. For
/// zoned anchors a date-only UNTIL is promoted to the anchor's time-of-day
/// in the anchor's zone, a floating UNTIL is assumed to be in the anchor's
/// zone, and a differently-zoned UNTIL is converted; the result is written
/// in UTC.
fn reconcile_until(recur: &mut Recur, anchor: &DateTimeValue) -> Result<()> {
    let Some(until_text) = recur.get("UNTIL").map(str::to_string) else {
        return Ok(());
    };

    if anchor.is_floating() {
        let naive = if until_text.len() == 8 {
            codec::parse_date(&until_text)?
                .and_hms_opt(0, 0, 0)
                .unwrap_or_default()
        } else {
            codec::parse_datetime(&until_text, None)?.naive
        };
        // The anchor expands in a zoneless frame; keep UNTIL in it too.
        recur.set("UNTIL", format!("{}Z", naive.format("%Y%m%dT%H%M%S")));
        return Ok(());
    }

    let until = if until_text.len() == 8 {
        let date = codec::parse_date(&until_text)?;
        DateTimeValue {
            naive: NaiveDateTime::new(date, anchor.naive.time()),
            zone: anchor.zone.clone(),
        }
    } else {
        let parsed = codec::parse_datetime(&until_text, None)?;
        if parsed.is_floating() {
            DateTimeValue {
                naive: parsed.naive,
                zone: anchor.zone.clone(),
            }
        } else {
            parsed
        }
    };
    let utc = tz::to_utc_naive(&until).unwrap_or(until.naive);
    recur.set("UNTIL", format!("{}Z", utc.format("%Y%m%dT%H%M%S")));
    Ok(())
}

/// Maps an anchor zone onto the `rrule` crate's timezone model and the
/// zone occurrences are reported in.
fn expansion_zone(zone: &Zone) -> (RRuleTz, Zone) {
    match zone {
        Zone::Floating => (RRuleTz::UTC, Zone::Floating),
        Zone::Utc => (RRuleTz::UTC, Zone::Utc),
        Zone::Tzid(id) => match tz::get_tzid(id, true) {
            Some(TzSource::Iana(iana)) => (RRuleTz::Tz(iana), Zone::Tzid(id.clone())),
            // Rules-backed and unknown zones expand in UTC.
            _ => (RRuleTz::UTC, Zone::Utc),
        },
    }
}

/// Converts a date-time value into the expansion timezone.
fn to_rrule_datetime(value: &DateTimeValue, rr_tz: RRuleTz) -> DateTime<RRuleTz> {
    use chrono::TimeZone;
    match &value.zone {
        Zone::Floating => RRuleTz::UTC
            .from_utc_datetime(&value.naive)
            .with_timezone(&rr_tz),
        Zone::Utc => RRuleTz::UTC
            .from_utc_datetime(&value.naive)
            .with_timezone(&rr_tz),
        Zone::Tzid(id) => {
            let utc = tz::get_tzid(id, true)
                .map_or(value.naive, |source| source.to_utc(value.naive));
            RRuleTz::UTC.from_utc_datetime(&utc).with_timezone(&rr_tz)
        }
    }
}

/// The date or date-time values carried by an RDATE/EXDATE line.
/// Period-valued RDATEs are not expanded.
fn date_values(line: &ContentLine) -> Vec<DateTimeValue> {
    match &line.value {
        Value::DateTimeList(list) => list.clone(),
        Value::DateList(list) => list
            .iter()
            .map(|d| DateTimeValue::from_date(*d))
            .collect(),
        Value::DateTime(dt) => vec![dt.clone()],
        Value::Raw(s) | Value::Text(s) => {
            let tzid = line.param("TZID");
            s.split(',')
                .filter_map(|x| codec::parse_datetime(x, tzid).ok())
                .collect()
        }
        _ => Vec::new(),
    }
}

/// Builds an RDATE/EXDATE native value from expanded instants.
fn date_list_value(dates: &[DateTime<RRuleTz>], zone: &Zone, is_date: bool) -> Value {
    if is_date {
        Value::DateList(dates.iter().map(|dt| dt.naive_local().date()).collect())
    } else {
        Value::DateTimeList(
            dates
                .iter()
                .map(|dt| match zone {
                    Zone::Floating => DateTimeValue::floating(dt.naive_local()),
                    Zone::Utc => DateTimeValue::utc(dt.with_timezone(&chrono::Utc).naive_utc()),
                    Zone::Tzid(id) => DateTimeValue::zoned(dt.naive_local(), id.clone()),
                })
                .collect(),
        )
    }
}

/// Writes a rule back as an RRULE string in canonical field order,
/// suppressing the BYDAY/BYMONTHDAY/BYMONTH values the `rrule` machinery
/// derives from DTSTART, to match how rules are usually written.
fn materialize_rule(rule: &RRule, anchor: &DateTimeValue, is_date: bool) -> String {
    let mut out = String::from("FREQ=");
    out.push_str(frequency_token(rule.get_freq()));
    let mut push = |key: &str, value: String| {
        out.push(';');
        out.push_str(key);
        out.push('=');
        out.push_str(&value);
    };

    if rule.get_interval() != 1 {
        push("INTERVAL", rule.get_interval().to_string());
    }
    if rule.get_week_start() != Weekday::Mon {
        push("WKST", weekday_token(rule.get_week_start()).to_string());
    }
    if !rule.get_by_set_pos().is_empty() {
        push("BYSETPOS", join_numbers(rule.get_by_set_pos().iter()));
    }
    if let Some(count) = rule.get_count() {
        push("COUNT", count.to_string());
    } else if let Some(until) = rule.get_until() {
        let value = if is_date {
            codec::date_to_string(until.naive_local().date())
        } else {
            format!(
                "{}Z",
                until
                    .with_timezone(&chrono::Utc)
                    .format("%Y%m%dT%H%M%S")
            )
        };
        push("UNTIL", value);
    }

    let mut every_days: Vec<Weekday> = Vec::new();
    let mut nth_days: Vec<(i16, Weekday)> = Vec::new();
    for entry in rule.get_by_weekday() {
        match entry {
            NWeekday::Every(wd) => every_days.push(*wd),
            NWeekday::Nth(n, wd) => nth_days.push((*n, *wd)),
        }
    }
    let mut days: Vec<String> = Vec::new();
    let anchor_weekday = anchor.naive.weekday();
    let implied_weekly = rule.get_freq() == Frequency::Weekly
        && every_days.len() == 1
        && every_days[0] == anchor_weekday;
    if !every_days.is_empty() && !implied_weekly {
        days.extend(every_days.iter().map(|wd| weekday_token(*wd).to_string()));
    }
    days.extend(
        nth_days
            .iter()
            .map(|(n, wd)| format!("{n}{}", weekday_token(*wd))),
    );
    if !days.is_empty() {
        push("BYDAY", days.join(","));
    }

    let by_month_day = rule.get_by_month_day();
    let positives: Vec<i8> = by_month_day.iter().copied().filter(|n| *n > 0).collect();
    let negatives: Vec<i8> = by_month_day.iter().copied().filter(|n| *n < 0).collect();
    let implied_month_day = matches!(
        rule.get_freq(),
        Frequency::Yearly | Frequency::Monthly
    ) && positives.len() == 1
        && i32::from(positives[0]) == i32::try_from(anchor.naive.day()).unwrap_or(0)
        && negatives.is_empty();
    let mut month_days: Vec<String> = Vec::new();
    if !positives.is_empty() && !implied_month_day {
        month_days.extend(positives.iter().map(ToString::to_string));
    }
    month_days.extend(negatives.iter().map(ToString::to_string));
    if !month_days.is_empty() {
        push("BYMONTHDAY", month_days.join(","));
    }

    let by_month: Vec<u8> = rule.get_by_month().to_vec();
    if !by_month.is_empty() {
        let implied_month = every_days.is_empty()
            && nth_days.is_empty()
            && rule.get_freq() == Frequency::Yearly
            && by_month.len() == 1
            && u32::from(by_month[0]) == anchor.naive.month();
        if !implied_month {
            push(
                "BYMONTH",
                by_month
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(","),
            );
        }
    }

    if !rule.get_by_year_day().is_empty() {
        push("BYYEARDAY", join_numbers(rule.get_by_year_day().iter()));
    }
    if !rule.get_by_week_no().is_empty() {
        push("BYWEEKNO", join_numbers(rule.get_by_week_no().iter()));
    }

    // BYHOUR, BYMINUTE, and BYSECOND are derived from DTSTART; always
    // omitted.
    out
}

fn join_numbers<T: ToString>(values: impl Iterator<Item = T>) -> String {
    values
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn naive(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    fn event_with(dtstart: Value, rrule: &str) -> Component {
        let mut event = Component::new("VEVENT");
        event.behavior = crate::behavior::get_behavior("VEVENT", None);
        event.add_line("dtstart").value = dtstart;
        event.add_line("rrule").value = Value::Raw(rrule.to_string());
        event
    }

    #[test]
    fn recur_parse_and_display() {
        let recur = Recur::parse("FREQ=WEEKLY;COUNT=2;INTERVAL=2;BYDAY=TU,TH").unwrap();
        assert_eq!(recur.get("FREQ"), Some("WEEKLY"));
        assert_eq!(recur.count(), Some(2));
        assert_eq!(
            recur.to_string(),
            "FREQ=WEEKLY;COUNT=2;INTERVAL=2;BYDAY=TU,TH"
        );
    }

    #[test]
    fn recur_strips_illegal_backslashes() {
        let recur = Recur::parse("FREQ=WEEKLY\\;COUNT=2").unwrap();
        assert_eq!(recur.get("COUNT"), Some("2"));
    }

    #[test]
    fn weekly_expansion() {
        let event = event_with(
            Value::DateTime(DateTimeValue::floating(naive(2005, 1, 19, 9, 0))),
            "FREQ=WEEKLY;COUNT=2;INTERVAL=2;BYDAY=TU,TH",
        );
        let set = event.rruleset().unwrap().unwrap();
        let dates: Vec<_> = set.occurrences(10).iter().map(|v| v.naive).collect();
        assert_eq!(dates, [naive(2005, 1, 20, 9, 0), naive(2005, 2, 1, 9, 0)]);
    }

    #[test]
    fn add_rdate_includes_dtstart_and_decrements_count() {
        let event = event_with(
            Value::DateTime(DateTimeValue::floating(naive(2005, 1, 19, 9, 0))),
            "FREQ=WEEKLY;COUNT=2;INTERVAL=2;BYDAY=TU,TH",
        );
        let set = event.get_rruleset(true).unwrap().unwrap();
        let dates: Vec<_> = set.occurrences(10).iter().map(|v| v.naive).collect();
        assert_eq!(dates, [naive(2005, 1, 19, 9, 0), naive(2005, 1, 20, 9, 0)]);
    }

    #[test]
    fn date_valued_anchor_expands_at_midnight() {
        let event = event_with(
            Value::Date(NaiveDate::from_ymd_opt(2005, 3, 18).unwrap()),
            "FREQ=WEEKLY;COUNT=2;INTERVAL=2;BYDAY=TU,TH",
        );
        let set = event.get_rruleset(true).unwrap().unwrap();
        let dates: Vec<_> = set.occurrences(10).iter().map(|v| v.naive).collect();
        assert_eq!(dates, [naive(2005, 3, 18, 0, 0), naive(2005, 3, 29, 0, 0)]);
    }

    #[test]
    fn no_rules_yields_none() {
        let mut event = Component::new("VEVENT");
        event.add_line("dtstart").value =
            Value::DateTime(DateTimeValue::floating(naive(2005, 1, 19, 9, 0)));
        assert!(event.rruleset().unwrap().is_none());
    }

    #[test]
    fn missing_anchor_yields_none() {
        let mut event = Component::new("VEVENT");
        event.add_line("rrule").value = Value::Raw("FREQ=DAILY;COUNT=3".into());
        assert!(event.rruleset().unwrap().is_none());
    }

    #[test]
    fn until_date_promoted_to_anchor_time() {
        let event = event_with(
            Value::DateTime(DateTimeValue::utc(naive(2006, 1, 26, 23, 0))),
            "FREQ=MONTHLY;BYDAY=-1TH;UNTIL=20061228",
        );
        let set = event.rruleset().unwrap().unwrap();
        let dates = set.occurrences(100);
        assert_eq!(dates.first().unwrap().naive, naive(2006, 1, 26, 23, 0));
        assert_eq!(dates.last().unwrap().naive, naive(2006, 12, 28, 23, 0));
        assert!(dates.iter().all(DateTimeValue::is_utc));
    }

    #[test]
    fn floating_anchor_ignores_utc_suffix_on_until() {
        let event = event_with(
            Value::DateTime(DateTimeValue::floating(naive(2013, 1, 17, 0, 0))),
            "FREQ=WEEKLY;UNTIL=20130328T235959Z",
        );
        let set = event.rruleset().unwrap().unwrap();
        let dates = set.occurrences(100);
        assert_eq!(dates.first().unwrap().naive, naive(2013, 1, 17, 0, 0));
        assert_eq!(dates.last().unwrap().naive, naive(2013, 3, 28, 0, 0));
        assert!(dates.iter().all(DateTimeValue::is_floating));
    }

    #[test]
    fn set_rruleset_round_trips_rule() {
        let event = event_with(
            Value::DateTime(DateTimeValue::floating(naive(2005, 1, 19, 9, 0))),
            "FREQ=WEEKLY;COUNT=2;INTERVAL=2;BYDAY=TU,TH",
        );
        let set = event.rruleset().unwrap().unwrap();

        let mut copy = Component::new("VEVENT");
        copy.behavior = crate::behavior::get_behavior("VEVENT", None);
        copy.add_line("dtstart").value =
            Value::DateTime(DateTimeValue::floating(naive(2005, 1, 19, 9, 0)));
        copy.set_rruleset(&set).unwrap();

        let text = copy.child_text("rrule").unwrap().to_string();
        assert!(text.starts_with("FREQ=WEEKLY"), "got {text}");
        assert!(text.contains("INTERVAL=2"), "got {text}");
        assert!(text.contains("COUNT=2"), "got {text}");
        assert!(text.contains("BYDAY=TU,TH"), "got {text}");

        let reparsed = copy.rruleset().unwrap().unwrap();
        assert_eq!(
            reparsed.occurrences(10).first().map(|v| v.naive),
            Some(naive(2005, 1, 20, 9, 0))
        );
    }

    #[test]
    fn set_rruleset_suppresses_implied_weekly_byday() {
        // DTSTART on a Wednesday with FREQ=WEEKLY and only that weekday:
        // the BYDAY part is implicit and should not be written.
        let event = event_with(
            Value::DateTime(DateTimeValue::floating(naive(2005, 1, 19, 9, 0))),
            "FREQ=WEEKLY;COUNT=4;BYDAY=WE",
        );
        let set = event.rruleset().unwrap().unwrap();
        let mut copy = Component::new("VEVENT");
        copy.behavior = crate::behavior::get_behavior("VEVENT", None);
        copy.add_line("dtstart").value =
            Value::DateTime(DateTimeValue::floating(naive(2005, 1, 19, 9, 0)));
        copy.set_rruleset(&set).unwrap();
        let text = copy.child_text("rrule").unwrap();
        assert!(!text.contains("BYDAY"), "got {text}");
    }

    #[test]
    fn vtodo_uses_due_as_anchor() {
        let mut todo = Component::new("VTODO");
        todo.behavior = crate::behavior::get_behavior("VTODO", None);
        todo.add_line("due").value =
            Value::DateTime(DateTimeValue::floating(naive(2005, 6, 1, 12, 0)));
        todo.add_line("rrule").value = Value::Raw("FREQ=DAILY;COUNT=2".into());
        let set = todo.rruleset().unwrap().unwrap();
        assert_eq!(
            set.occurrences(10).first().map(|v| v.naive),
            Some(naive(2005, 6, 1, 12, 0))
        );
    }
}
