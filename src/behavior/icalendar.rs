//! iCalendar (vCalendar 2.0) behavior table and implicit-field generation.

use std::collections::BTreeSet;

use chrono::Utc;
use uuid::Uuid;

use crate::core::{Component, DateTimeValue, Node, Value};
use crate::error::Result;
use crate::tz;

use super::{Behavior, BehaviorKind, Registry, spec};

/// Product identifier stamped onto serialized calendars.
pub const PRODID: &str = "-//VOBJECT.RS//NONSGML Version 1//EN";

/// Backslash-escaped single-value text.
pub static TEXT: Behavior = Behavior {
    name: "TEXT",
    description: "Backslash-escaped text value.",
    kind: BehaviorKind::Text,
    ..Behavior::DEFAULT
};

/// Comma-separated multi-valued text (CATEGORIES, RESOURCES).
pub static MULTI_TEXT: Behavior = Behavior {
    name: "MULTI-TEXT",
    description: "Comma separated list of escaped text values.",
    kind: BehaviorKind::MultiText { separator: ',' },
    ..Behavior::DEFAULT
};

/// Semicolon-separated multi-valued text (REQUEST-STATUS).
pub static SEMICOLON_MULTI_TEXT: Behavior = Behavior {
    name: "SEMICOLON-MULTI-TEXT",
    description: "Semicolon separated list of escaped text values.",
    kind: BehaviorKind::MultiText { separator: ';' },
    ..Behavior::DEFAULT
};

/// No escaping at all. TZID needs this because some producers put commas in
/// timezone identifiers which must not read as multi-valued text; RRULE
/// needs it so semicolons stay unescaped.
pub static RAW: Behavior = Behavior {
    name: "RAW",
    description: "Unescaped value, passed through verbatim.",
    kind: BehaviorKind::Raw,
    ..Behavior::DEFAULT
};

/// A DATE-TIME that must be expressed in UTC (DTSTAMP, CREATED, ...).
pub static UTC_DATETIME: Behavior = Behavior {
    name: "UTC-DATE-TIME",
    description: "A date-time specified in UTC.",
    kind: BehaviorKind::DateTime,
    has_native: true,
    force_utc: true,
    ..Behavior::DEFAULT
};

/// A DATE or DATE-TIME (DTSTART, DTEND, DUE, RECURRENCE-ID).
pub static DATE_OR_DATETIME: Behavior = Behavior {
    name: "DATE-OR-DATE-TIME",
    description: "A date or date-time value.",
    kind: BehaviorKind::DateOrDateTime,
    has_native: true,
    ..Behavior::DEFAULT
};

/// One or more DATE, DATE-TIME, or PERIOD values (RDATE, EXDATE).
pub static MULTI_DATE: Behavior = Behavior {
    name: "MULTI-DATE",
    description: "One or more date, date-time, or period values.",
    kind: BehaviorKind::MultiDate,
    has_native: true,
    ..Behavior::DEFAULT
};

/// A DURATION property.
pub static DURATION: Behavior = Behavior {
    name: "DURATION",
    description: "A length of time.",
    kind: BehaviorKind::Duration,
    has_native: true,
    ..Behavior::DEFAULT
};

/// A TRIGGER property: DURATION by default, DATE-TIME in UTC on request.
pub static TRIGGER: Behavior = Behavior {
    name: "TRIGGER",
    description: "When an alarm will trigger.",
    kind: BehaviorKind::Trigger,
    has_native: true,
    force_utc: true,
    ..Behavior::DEFAULT
};

/// FREEBUSY periods, always in UTC.
pub static FREEBUSY: Behavior = Behavior {
    name: "FREEBUSY",
    description: "Free or busy periods of time.",
    kind: BehaviorKind::Periods,
    has_native: true,
    force_utc: true,
    ..Behavior::DEFAULT
};

/// The VCALENDAR root component.
pub static VCALENDAR: Behavior = Behavior {
    name: "VCALENDAR",
    version: Some("2.0"),
    description: "vCalendar 2.0, also known as iCalendar.",
    kind: BehaviorKind::Calendar,
    is_component: true,
    sort_first: &["version", "calscale", "method", "prodid", "vtimezone"],
    known_children: &[
        spec("CALSCALE", 0, Some(1)),
        spec("METHOD", 0, Some(1)),
        spec("VERSION", 0, Some(1)),
        spec("PRODID", 1, Some(1)),
        spec("VTIMEZONE", 0, None),
        spec("VEVENT", 0, None),
        spec("VTODO", 0, None),
        spec("VJOURNAL", 0, None),
        spec("VFREEBUSY", 0, None),
        spec("VAVAILABILITY", 0, None),
    ],
    default_line: Some(&TEXT),
    ..Behavior::DEFAULT
};

/// A VTIMEZONE component.
pub static VTIMEZONE: Behavior = Behavior {
    name: "VTIMEZONE",
    description: "A grouping of component properties that defines a time zone.",
    kind: BehaviorKind::Timezone,
    is_component: true,
    has_native: true,
    sort_first: &["tzid", "last-modified", "tzurl", "standard", "daylight"],
    known_children: &[
        spec("TZID", 1, Some(1)),
        spec("LAST-MODIFIED", 0, Some(1)),
        spec("TZURL", 0, Some(1)),
        spec("STANDARD", 0, None),
        spec("DAYLIGHT", 0, None),
    ],
    default_line: Some(&TEXT),
    ..Behavior::DEFAULT
};

/// STANDARD and DAYLIGHT sub-components of a VTIMEZONE.
pub static OBSERVANCE: Behavior = Behavior {
    name: "STANDARD",
    description: "A timezone offset observance.",
    kind: BehaviorKind::Observance,
    is_component: true,
    known_children: &[spec("DTSTART", 1, Some(1)), spec("RRULE", 0, Some(1))],
    default_line: Some(&TEXT),
    ..Behavior::DEFAULT
};

/// A VEVENT component.
pub static VEVENT: Behavior = Behavior {
    name: "VEVENT",
    description: "A scheduled amount of time on a calendar.",
    kind: BehaviorKind::Recurring,
    is_component: true,
    has_native: true,
    sort_first: &["uid", "recurrence-id", "dtstart", "duration", "dtend"],
    known_children: &[
        spec("DTSTART", 0, Some(1)),
        spec("CLASS", 0, Some(1)),
        spec("CREATED", 0, Some(1)),
        spec("DESCRIPTION", 0, Some(1)),
        spec("GEO", 0, Some(1)),
        spec("LAST-MODIFIED", 0, Some(1)),
        spec("LOCATION", 0, Some(1)),
        spec("ORGANIZER", 0, Some(1)),
        spec("PRIORITY", 0, Some(1)),
        spec("DTSTAMP", 1, Some(1)),
        spec("SEQUENCE", 0, Some(1)),
        spec("STATUS", 0, Some(1)),
        spec("SUMMARY", 0, Some(1)),
        spec("TRANSP", 0, Some(1)),
        spec("UID", 1, Some(1)),
        spec("URL", 0, Some(1)),
        spec("RECURRENCE-ID", 0, Some(1)),
        spec("DTEND", 0, Some(1)),
        spec("DURATION", 0, Some(1)),
        spec("ATTACH", 0, None),
        spec("ATTENDEE", 0, None),
        spec("CATEGORIES", 0, None),
        spec("COMMENT", 0, None),
        spec("CONTACT", 0, None),
        spec("EXDATE", 0, None),
        spec("EXRULE", 0, None),
        spec("REQUEST-STATUS", 0, None),
        spec("RELATED-TO", 0, None),
        spec("RESOURCES", 0, None),
        spec("RDATE", 0, None),
        spec("RRULE", 0, None),
        spec("VALARM", 0, None),
    ],
    default_line: Some(&TEXT),
    ..Behavior::DEFAULT
};

/// A VTODO component.
pub static VTODO: Behavior = Behavior {
    name: "VTODO",
    description: "An action-item or assignment.",
    kind: BehaviorKind::Recurring,
    is_component: true,
    has_native: true,
    known_children: &[
        spec("DTSTART", 0, Some(1)),
        spec("CLASS", 0, Some(1)),
        spec("COMPLETED", 0, Some(1)),
        spec("CREATED", 0, Some(1)),
        spec("DESCRIPTION", 0, Some(1)),
        spec("GEO", 0, Some(1)),
        spec("LAST-MODIFIED", 0, Some(1)),
        spec("LOCATION", 0, Some(1)),
        spec("ORGANIZER", 0, Some(1)),
        spec("PERCENT", 0, Some(1)),
        spec("PRIORITY", 0, Some(1)),
        spec("DTSTAMP", 1, Some(1)),
        spec("SEQUENCE", 0, Some(1)),
        spec("STATUS", 0, Some(1)),
        spec("SUMMARY", 0, Some(1)),
        spec("UID", 0, Some(1)),
        spec("URL", 0, Some(1)),
        spec("RECURRENCE-ID", 0, Some(1)),
        spec("DUE", 0, Some(1)),
        spec("DURATION", 0, Some(1)),
        spec("ATTACH", 0, None),
        spec("ATTENDEE", 0, None),
        spec("CATEGORIES", 0, None),
        spec("COMMENT", 0, None),
        spec("CONTACT", 0, None),
        spec("EXDATE", 0, None),
        spec("EXRULE", 0, None),
        spec("REQUEST-STATUS", 0, None),
        spec("RELATED-TO", 0, None),
        spec("RESOURCES", 0, None),
        spec("RDATE", 0, None),
        spec("RRULE", 0, None),
        spec("VALARM", 0, None),
    ],
    default_line: Some(&TEXT),
    ..Behavior::DEFAULT
};

/// A VJOURNAL component.
pub static VJOURNAL: Behavior = Behavior {
    name: "VJOURNAL",
    description: "A journal entry.",
    kind: BehaviorKind::Recurring,
    is_component: true,
    has_native: true,
    known_children: &[
        spec("DTSTART", 0, Some(1)),
        spec("CLASS", 0, Some(1)),
        spec("CREATED", 0, Some(1)),
        spec("DESCRIPTION", 0, Some(1)),
        spec("LAST-MODIFIED", 0, Some(1)),
        spec("ORGANIZER", 0, Some(1)),
        spec("DTSTAMP", 1, Some(1)),
        spec("SEQUENCE", 0, Some(1)),
        spec("STATUS", 0, Some(1)),
        spec("SUMMARY", 0, Some(1)),
        spec("UID", 0, Some(1)),
        spec("URL", 0, Some(1)),
        spec("RECURRENCE-ID", 0, Some(1)),
        spec("ATTACH", 0, None),
        spec("ATTENDEE", 0, None),
        spec("CATEGORIES", 0, None),
        spec("COMMENT", 0, None),
        spec("CONTACT", 0, None),
        spec("EXDATE", 0, None),
        spec("EXRULE", 0, None),
        spec("REQUEST-STATUS", 0, None),
        spec("RELATED-TO", 0, None),
        spec("RDATE", 0, None),
        spec("RRULE", 0, None),
    ],
    default_line: Some(&TEXT),
    ..Behavior::DEFAULT
};

/// A VFREEBUSY component.
pub static VFREEBUSY: Behavior = Behavior {
    name: "VFREEBUSY",
    description: "A request for, or description of, free/busy time.",
    kind: BehaviorKind::FreeBusyComponent,
    is_component: true,
    sort_first: &["uid", "dtstart", "duration", "dtend"],
    known_children: &[
        spec("DTSTART", 0, Some(1)),
        spec("CONTACT", 0, Some(1)),
        spec("DTEND", 0, Some(1)),
        spec("DURATION", 0, Some(1)),
        spec("ORGANIZER", 0, Some(1)),
        spec("DTSTAMP", 1, Some(1)),
        spec("UID", 0, Some(1)),
        spec("URL", 0, Some(1)),
        spec("ATTENDEE", 0, None),
        spec("COMMENT", 0, None),
        spec("FREEBUSY", 0, None),
        spec("REQUEST-STATUS", 0, None),
    ],
    default_line: Some(&TEXT),
    ..Behavior::DEFAULT
};

/// A VALARM component.
pub static VALARM: Behavior = Behavior {
    name: "VALARM",
    description: "When and how to provide alerts about events and to-dos.",
    kind: BehaviorKind::Alarm,
    is_component: true,
    known_children: &[
        spec("ACTION", 1, Some(1)),
        spec("TRIGGER", 1, Some(1)),
        spec("DURATION", 0, Some(1)),
        spec("REPEAT", 0, Some(1)),
        spec("DESCRIPTION", 0, Some(1)),
    ],
    default_line: Some(&TEXT),
    ..Behavior::DEFAULT
};

/// A VAVAILABILITY component.
pub static VAVAILABILITY: Behavior = Behavior {
    name: "VAVAILABILITY",
    description: "A user's available time slots.",
    kind: BehaviorKind::Availability,
    is_component: true,
    sort_first: &["uid", "dtstart", "duration", "dtend"],
    known_children: &[
        spec("UID", 1, Some(1)),
        spec("DTSTAMP", 1, Some(1)),
        spec("BUSYTYPE", 0, Some(1)),
        spec("CREATED", 0, Some(1)),
        spec("DTSTART", 0, Some(1)),
        spec("LAST-MODIFIED", 0, Some(1)),
        spec("ORGANIZER", 0, Some(1)),
        spec("SEQUENCE", 0, Some(1)),
        spec("SUMMARY", 0, Some(1)),
        spec("URL", 0, Some(1)),
        spec("DTEND", 0, Some(1)),
        spec("DURATION", 0, Some(1)),
        spec("CATEGORIES", 0, None),
        spec("COMMENT", 0, None),
        spec("CONTACT", 0, None),
        spec("AVAILABLE", 0, None),
    ],
    default_line: Some(&TEXT),
    ..Behavior::DEFAULT
};

/// An AVAILABLE sub-component of VAVAILABILITY.
pub static AVAILABLE: Behavior = Behavior {
    name: "AVAILABLE",
    description: "A period of time in which a user is normally available.",
    kind: BehaviorKind::Recurring,
    is_component: true,
    has_native: true,
    sort_first: &["uid", "recurrence-id", "dtstart", "duration", "dtend"],
    known_children: &[
        spec("DTSTAMP", 1, Some(1)),
        spec("DTSTART", 1, Some(1)),
        spec("UID", 1, Some(1)),
        spec("DTEND", 0, Some(1)),
        spec("DURATION", 0, Some(1)),
        spec("CREATED", 0, Some(1)),
        spec("LAST-MODIFIED", 0, Some(1)),
        spec("RECURRENCE-ID", 0, Some(1)),
        spec("RRULE", 0, Some(1)),
        spec("SUMMARY", 0, Some(1)),
        spec("CATEGORIES", 0, None),
        spec("COMMENT", 0, None),
        spec("CONTACT", 0, None),
        spec("EXDATE", 0, None),
        spec("RDATE", 0, None),
    ],
    default_line: Some(&TEXT),
    ..Behavior::DEFAULT
};

/// Registers the full iCalendar table.
pub fn register_all(registry: &mut Registry) {
    registry.register(&VCALENDAR, None, false, None);
    registry.register(&VTIMEZONE, None, false, None);
    registry.register(&RAW, Some("TZID"), false, None);
    registry.register(&OBSERVANCE, Some("STANDARD"), false, None);
    registry.register(&OBSERVANCE, Some("DAYLIGHT"), false, None);
    registry.register(&VEVENT, None, false, None);
    registry.register(&VTODO, None, false, None);
    registry.register(&VJOURNAL, None, false, None);
    registry.register(&VFREEBUSY, None, false, None);
    registry.register(&VALARM, None, false, None);
    registry.register(&VAVAILABILITY, None, false, None);
    registry.register(&AVAILABLE, None, false, None);
    registry.register(&DURATION, None, false, None);
    registry.register(&TRIGGER, None, false, None);
    registry.register(&FREEBUSY, None, false, None);
    registry.register(&RAW, Some("RRULE"), false, None);
    registry.register(&RAW, Some("EXRULE"), false, None);

    for name in ["LAST-MODIFIED", "CREATED", "COMPLETED", "DTSTAMP"] {
        registry.register(&UTC_DATETIME, Some(name), false, None);
    }
    for name in ["DTEND", "DTSTART", "DUE", "RECURRENCE-ID"] {
        registry.register(&DATE_OR_DATETIME, Some(name), false, None);
    }
    for name in ["RDATE", "EXDATE"] {
        registry.register(&MULTI_DATE, Some(name), false, None);
    }
    for name in [
        "CALSCALE",
        "METHOD",
        "PRODID",
        "CLASS",
        "COMMENT",
        "DESCRIPTION",
        "LOCATION",
        "STATUS",
        "SUMMARY",
        "TRANSP",
        "CONTACT",
        "RELATED-TO",
        "UID",
        "ACTION",
        "BUSYTYPE",
    ] {
        registry.register(&TEXT, Some(name), false, None);
    }
    for name in ["CATEGORIES", "RESOURCES"] {
        registry.register(&MULTI_TEXT, Some(name), false, None);
    }
    registry.register(&SEMICOLON_MULTI_TEXT, Some("REQUEST-STATUS"), false, None);
}

// ------------------------------------------------- implicit generation ----

/// Generates a UID and DTSTAMP when missing on a recurring component.
pub(crate) fn generate_recurring_implicits(comp: &mut Component) {
    let now = Utc::now().naive_utc();
    if !comp.contains("uid") {
        let stamp = crate::codec::datetime_to_string(&DateTimeValue::utc(now), false);
        let host = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "localhost".to_string());
        comp.add_line("uid").value =
            Value::Text(format!("{stamp} - {}@{host}", Uuid::new_v4().simple()));
    }
    if !comp.contains("dtstamp") {
        comp.add_line("dtstamp").value = Value::DateTime(DateTimeValue::utc(now));
    }
}

/// Generates default ACTION and TRIGGER when missing on a VALARM.
pub(crate) fn generate_alarm_implicits(comp: &mut Component) {
    if !comp.contains("action") {
        comp.add_line("action").value = Value::Text("AUDIO".into());
    }
    if !comp.contains("trigger") {
        comp.add_line("trigger").value = Value::Duration(chrono::TimeDelta::zero());
    }
}

/// Generates PRODID, VERSION, and missing VTIMEZONEs on a VCALENDAR.
///
/// A VTIMEZONE is synthesized for every TZID referenced by a date-time
/// value anywhere in the tree (outside VTIMEZONEs and forced-UTC lines)
/// that is not already present.
pub(crate) fn generate_calendar_implicits(comp: &mut Component) -> Result<()> {
    let keys: Vec<String> = comp.contents().keys().cloned().collect();
    for key in keys {
        if let Some(bucket) = comp.children_mut(&key) {
            for node in bucket {
                if let Node::Component(child) = node
                    && let Some(b) = child.behavior
                {
                    b.generate_implicit(child)?;
                }
            }
        }
    }

    if !comp.contains("prodid") {
        comp.add_line("prodid").value = Value::Text(PRODID.into());
    }
    if !comp.contains("version") {
        comp.add_line("version").value = Value::Text("2.0".into());
    }

    let mut used = BTreeSet::new();
    collect_tzids(comp, &mut used);

    let existing: BTreeSet<String> = comp
        .children("vtimezone")
        .iter()
        .filter_map(Node::as_component)
        .filter_map(|tz_comp| tz_comp.child_text("tzid"))
        .map(str::to_string)
        .collect();

    for tzid in used {
        if tzid == "UTC" || existing.contains(&tzid) {
            continue;
        }
        match tz::get_tzid(&tzid, true) {
            Some(source) => {
                let mut vtz = Component::new("VTIMEZONE");
                vtz.behavior = Some(&VTIMEZONE);
                vtz.set_tzinfo(&source, tz::DEFAULT_START_YEAR, tz::DEFAULT_END_YEAR)?;
                comp.add_node(Node::Component(vtz))?;
            }
            None => tracing::error!(tzid, "no timezone registered for referenced TZID"),
        }
    }
    Ok(())
}

/// Collects TZIDs referenced by date-time values, skipping forced-UTC lines
/// and VTIMEZONE subtrees.
fn collect_tzids(comp: &Component, out: &mut BTreeSet<String>) {
    for node in comp.all_children() {
        match node {
            Node::Line(line) => {
                if line.behavior.is_some_and(|b| b.force_utc) {
                    continue;
                }
                match &line.value {
                    Value::DateTime(dt) => {
                        if let Some(tzid) = dt.tzid() {
                            out.insert(tzid.to_string());
                        }
                    }
                    Value::DateTimeList(list) => {
                        for dt in list {
                            if let Some(tzid) = dt.tzid() {
                                out.insert(tzid.to_string());
                            }
                        }
                    }
                    Value::Periods(periods) => {
                        for p in periods {
                            if let Some(tzid) = p.start.tzid() {
                                out.insert(tzid.to_string());
                            }
                        }
                    }
                    _ => {
                        if let Some(tzid) = line.param("TZID") {
                            out.insert(tzid.to_string());
                        }
                    }
                }
            }
            Node::Component(child) => {
                if child.name != "VTIMEZONE" {
                    collect_tzids(child, out);
                }
            }
        }
    }
}
