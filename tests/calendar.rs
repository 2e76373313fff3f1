//! iCalendar scenarios: the canonical freebusy serialization, recurrence
//! expansion with UNTIL reconciliation, and timezone synthesis.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use vobject::{
    DateTimeValue, ParseOptions, Period, TzSource, Value, read_one, tz, unregister_tzid,
};

fn naive(y: i32, mo: u32, d: u32, h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, mo, d)
        .unwrap()
        .and_hms_opt(h, 0, 0)
        .unwrap()
}

const FREEBUSY_FIXTURE: &str = "BEGIN:VFREEBUSY\r\n\
UID:test\r\n\
DTSTART:20060216T010000Z\r\n\
DTEND:20060216T030000Z\r\n\
DTSTAMP:20060215T000000Z\r\n\
FREEBUSY:20060216T010000Z/PT1H\r\n\
FREEBUSY:20060216T010000Z/20060216T030000Z\r\n\
END:VFREEBUSY\r\n";

#[test_log::test]
fn freebusy_serializes_byte_for_byte() {
    let node = vobject::new_from_behavior("VFREEBUSY", None).unwrap();
    let vobject::Node::Component(mut vfb) = node else {
        panic!("VFREEBUSY should be a component");
    };
    let dtstart = DateTimeValue::utc(naive(2006, 2, 16, 1));
    let dtend = DateTimeValue::utc(naive(2006, 2, 16, 3));

    vfb.add_line("uid").value = Value::Text("test".into());
    vfb.add_line("dtstamp").value = Value::DateTime(DateTimeValue::utc(naive(2006, 2, 15, 0)));
    vfb.add_line("dtstart").value = Value::DateTime(dtstart.clone());
    vfb.add_line("dtend").value = Value::DateTime(dtend.clone());
    vfb.add_line("freebusy").value =
        Value::Periods(vec![Period::with_duration(dtstart.clone(), TimeDelta::hours(1))]);
    vfb.add_line("freebusy").value = Value::Periods(vec![Period::with_end(dtstart, dtend)]);

    assert_eq!(vfb.serialize_default().unwrap(), FREEBUSY_FIXTURE);
}

#[test_log::test]
fn freebusy_fixture_reparses() {
    let vfb = read_one(FREEBUSY_FIXTURE, &ParseOptions::default()).unwrap();
    let periods = vfb
        .children("freebusy")
        .iter()
        .filter_map(vobject::Node::as_line)
        .filter_map(|l| l.value.as_periods())
        .count();
    assert_eq!(periods, 2);
}

#[test_log::test]
fn period_round_trip() {
    let period = Period::with_duration(
        DateTimeValue::floating(naive(2006, 2, 16, 10)),
        TimeDelta::hours(2),
    );
    let text = vobject::codec::period_to_string(&period, true);
    assert_eq!(text, "20060216T100000/PT2H");
    let reparsed = vobject::codec::parse_period(&text, None).unwrap();
    assert_eq!(reparsed, period);
}

#[test_log::test]
fn dtstart_parses_to_floating_datetime() {
    let line = vobject::parse::parse_line("DTSTART:20060509T000000", None).unwrap();
    let mut line = line;
    vobject::get_behavior("DTSTART", None)
        .unwrap()
        .transform_to_native(&mut line)
        .unwrap();
    let dt = line.value.as_datetime().unwrap();
    assert_eq!(dt.naive, naive(2006, 5, 9, 0));
    assert!(dt.is_floating());
}

const RECURRENCE_FIXTURE: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:-//Test//Test//EN\r\n\
BEGIN:VEVENT\r\n\
UID:recur@example.com\r\n\
DTSTAMP:20060126T230000Z\r\n\
DTSTART;VALUE=DATE-TIME:20060126T230000Z\r\n\
DURATION:PT1H\r\n\
RRULE:FREQ=MONTHLY;UNTIL=20061228;BYDAY=-1TH\r\n\
SUMMARY:Last Thursday of the month\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

#[test_log::test]
fn recurrence_until_includes_final_day() {
    let cal = read_one(RECURRENCE_FIXTURE, &ParseOptions::default()).unwrap();
    let event = cal.component("vevent").unwrap();
    let set = event.rruleset().unwrap().unwrap();
    let dates = set.occurrences(100);

    assert_eq!(dates[0].naive, naive(2006, 1, 26, 23));
    assert_eq!(dates[1].naive, naive(2006, 2, 23, 23));
    assert_eq!(dates.last().unwrap().naive, naive(2006, 12, 28, 23));
    assert!(dates.iter().all(DateTimeValue::is_utc));
    assert_eq!(dates.len(), 12);
}

const EASTERN_FIXTURE: &str = "BEGIN:VTIMEZONE\r\n\
TZID:US/Eastern\r\n\
BEGIN:STANDARD\r\n\
DTSTART:20001029T020000\r\n\
RRULE:FREQ=YEARLY;BYDAY=-1SU;BYMONTH=10;UNTIL=20061029T060000Z\r\n\
TZNAME:EST\r\n\
TZOFFSETFROM:-0400\r\n\
TZOFFSETTO:-0500\r\n\
END:STANDARD\r\n\
BEGIN:STANDARD\r\n\
DTSTART:20071104T020000\r\n\
RRULE:FREQ=YEARLY;BYDAY=1SU;BYMONTH=11\r\n\
TZNAME:EST\r\n\
TZOFFSETFROM:-0400\r\n\
TZOFFSETTO:-0500\r\n\
END:STANDARD\r\n\
BEGIN:DAYLIGHT\r\n\
DTSTART:20000402T020000\r\n\
RRULE:FREQ=YEARLY;BYDAY=1SU;BYMONTH=4;UNTIL=20060402T070000Z\r\n\
TZNAME:EDT\r\n\
TZOFFSETFROM:-0500\r\n\
TZOFFSETTO:-0400\r\n\
END:DAYLIGHT\r\n\
BEGIN:DAYLIGHT\r\n\
DTSTART:20070311T020000\r\n\
RRULE:FREQ=YEARLY;BYDAY=2SU;BYMONTH=3\r\n\
TZNAME:EDT\r\n\
TZOFFSETFROM:-0500\r\n\
TZOFFSETTO:-0400\r\n\
END:DAYLIGHT\r\n\
END:VTIMEZONE\r\n";

#[test_log::test]
fn serializing_a_zoned_event_embeds_the_vtimezone() {
    unregister_tzid("US/Eastern");

    let mut cal = vobject::icalendar();
    let event = cal.add_component("VEVENT");
    event.add_line("dtstart").value =
        Value::DateTime(DateTimeValue::zoned(naive(2008, 10, 12, 9), "US/Eastern"));

    let output = cal.serialize_default().unwrap();
    assert!(
        output.contains(EASTERN_FIXTURE),
        "serialized calendar is missing the expected VTIMEZONE:\n{output}"
    );
    assert!(output.contains("DTSTART;TZID=US/Eastern:20081012T090000\r\n"));
}

#[test_log::test]
fn parsed_vtimezone_resolves_recurrence_zones() {
    unregister_tzid("Custom/Zone");
    let input = format!(
        "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//Test//Test//EN\r\n{}\
         BEGIN:VEVENT\r\n\
         UID:zoned@example.com\r\n\
         DTSTAMP:20060126T230000Z\r\n\
         DTSTART;TZID=Custom/Zone:20060126T180000\r\n\
         RRULE:FREQ=DAILY;COUNT=2\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR\r\n",
        EASTERN_FIXTURE.replace("US/Eastern", "Custom/Zone")
    );
    let cal = read_one(&input, &ParseOptions::default()).unwrap();

    // The embedded definition was registered while transforming.
    let source = tz::get_tzid("Custom/Zone", false).unwrap();
    assert!(matches!(source, TzSource::Rules(_)));
    assert_eq!(
        source.utc_offset(naive(2006, 1, 26, 18), None),
        TimeDelta::hours(-5)
    );

    // Rules-backed zones expand in UTC.
    let event = cal.component("vevent").unwrap();
    let set = event.rruleset().unwrap().unwrap();
    let dates = set.occurrences(10);
    assert_eq!(dates[0].naive, naive(2006, 1, 26, 23));
    assert_eq!(dates[1].naive, naive(2006, 1, 27, 23));
    unregister_tzid("Custom/Zone");
}

#[test_log::test]
fn vtimezone_round_trip_through_rules() {
    let comp = read_one(EASTERN_FIXTURE, &ParseOptions::default()).unwrap();
    let source = comp.tzinfo().unwrap();
    assert_eq!(source.utc_offset(naive(2026, 1, 15, 12), None), TimeDelta::hours(-5));
    assert_eq!(source.utc_offset(naive(2026, 7, 15, 12), None), TimeDelta::hours(-4));
    assert_eq!(tz::pick_tzid(&source, false).as_deref(), Some("US/Eastern"));
}

#[test_log::test]
fn valarm_defaults_are_generated() {
    let mut cal = vobject::icalendar();
    let event = cal.add_component("VEVENT");
    event.add_line("uid").value = Value::Text("alarm@example.com".into());
    event.add_component("VALARM");

    let output = cal.serialize_default().unwrap();
    assert!(output.contains("BEGIN:VALARM\r\n"));
    assert!(output.contains("ACTION:AUDIO\r\n"));
    assert!(output.contains("TRIGGER:PT0S\r\n"));
}

#[test_log::test]
fn implicit_uid_dtstamp_version_prodid() {
    let mut cal = vobject::icalendar();
    let event = cal.add_component("VEVENT");
    event.add_line("summary").value = Value::Text("bare".into());

    let output = cal.serialize_default().unwrap();
    assert!(output.contains("VERSION:2.0\r\n"));
    assert!(output.contains("PRODID:"));
    assert!(output.contains("UID:"));
    assert!(output.contains("DTSTAMP:"));
}

#[test_log::test]
fn availability_components_serialize() {
    let node = vobject::new_from_behavior("VAVAILABILITY", None).unwrap();
    let vobject::Node::Component(mut avail) = node else {
        panic!("VAVAILABILITY should be a component");
    };
    avail.add_line("uid").value = Value::Text("test".into());
    avail.add_line("dtstamp").value = Value::DateTime(DateTimeValue::utc(naive(2006, 2, 15, 0)));
    avail.add_line("dtstart").value = Value::DateTime(DateTimeValue::utc(naive(2006, 2, 16, 0)));
    avail.add_line("dtend").value = Value::DateTime(DateTimeValue::utc(naive(2006, 2, 17, 0)));
    avail.add_line("busytype").value = Value::Text("BUSY".into());

    let mut slot = vobject::Component::new("AVAILABLE");
    slot.behavior = vobject::get_behavior("AVAILABLE", None);
    slot.add_line("uid").value = Value::Text("test1".into());
    slot.add_line("dtstamp").value = Value::DateTime(DateTimeValue::utc(naive(2006, 2, 15, 0)));
    slot.add_line("dtstart").value = Value::DateTime(DateTimeValue::utc(naive(2006, 2, 16, 9)));
    slot.add_line("dtend").value = Value::DateTime(DateTimeValue::utc(naive(2006, 2, 16, 12)));
    slot.add_line("summary").value = Value::Text("Available in the morning".into());
    avail.add_node(vobject::Node::Component(slot)).unwrap();

    let output = avail.serialize_default().unwrap();
    assert_eq!(
        output,
        "BEGIN:VAVAILABILITY\r\n\
         UID:test\r\n\
         DTSTART:20060216T000000Z\r\n\
         DTEND:20060217T000000Z\r\n\
         BUSYTYPE:BUSY\r\n\
         DTSTAMP:20060215T000000Z\r\n\
         BEGIN:AVAILABLE\r\n\
         UID:test1\r\n\
         DTSTART:20060216T090000Z\r\n\
         DTEND:20060216T120000Z\r\n\
         DTSTAMP:20060215T000000Z\r\n\
         SUMMARY:Available in the morning\r\n\
         END:AVAILABLE\r\n\
         END:VAVAILABILITY\r\n"
    );
}

#[test_log::test]
fn validation_catches_exclusive_pairs() {
    let input = "BEGIN:VCALENDAR\r\n\
                 VERSION:2.0\r\n\
                 PRODID:-//Test//Test//EN\r\n\
                 BEGIN:VEVENT\r\n\
                 UID:bad@example.com\r\n\
                 DTSTAMP:20060509T000000Z\r\n\
                 DTEND:20060509T130000Z\r\n\
                 DURATION:PT1H\r\n\
                 END:VEVENT\r\n\
                 END:VCALENDAR\r\n";
    let options = ParseOptions {
        validate: true,
        ..ParseOptions::default()
    };
    assert!(read_one(input, &options).is_err());
}
