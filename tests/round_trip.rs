//! Round-trip invariants: parse → serialize → parse yields an equal tree,
//! folding respects the octet budget, and escapes survive intact.

use vobject::{ParseOptions, Value, read_one};

fn reparse_equal(input: &str) {
    let mut first = read_one(input, &ParseOptions::default()).unwrap();
    let output = first.serialize_default().unwrap();
    let second = read_one(&output, &ParseOptions::default()).unwrap();
    assert_eq!(first, second, "tree changed across a round trip:\n{output}");
}

#[test_log::test]
fn simple_event_round_trips() {
    reparse_equal(
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//Test//Test//EN\r\n\
         BEGIN:VEVENT\r\n\
         UID:round@example.com\r\n\
         DTSTAMP:20060509T000000Z\r\n\
         DTSTART:20060509T120000Z\r\n\
         SUMMARY:Semicolons\\; commas\\, and backslashes\\\\ survive\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR\r\n",
    );
}

#[test_log::test]
fn floating_and_zoned_datetimes_round_trip() {
    reparse_equal(
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//Test//Test//EN\r\n\
         BEGIN:VEVENT\r\n\
         UID:float@example.com\r\n\
         DTSTAMP:20060509T000000Z\r\n\
         DTSTART;TZID=US/Eastern:20060509T090000\r\n\
         DTEND:20060509T110000\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR\r\n",
    );
}

#[test_log::test]
fn begin_end_only_component_round_trips() {
    let mut comp = read_one("BEGIN:X-EMPTY\r\nEND:X-EMPTY\r\n", &ParseOptions::default()).unwrap();
    assert!(comp.is_empty());
    let output = comp.serialize(75, false).unwrap();
    assert_eq!(output, "BEGIN:X-EMPTY\r\nEND:X-EMPTY\r\n");
}

#[test_log::test]
fn folded_output_respects_octet_budget() {
    let long_summary = "A moderately long description that will certainly exceed the \
                        seventy-five octet folding limit of the serialized form and then \
                        some more to force several continuation lines."
        .repeat(2);
    let mut cal = vobject::icalendar();
    let event = cal.add_component("VEVENT");
    event.add_line("uid").value = Value::Text("fold@example.com".into());
    event.add_line("summary").value = Value::Text(long_summary.clone());

    let output = cal.serialize_default().unwrap();
    for physical in output.split("\r\n") {
        assert!(
            physical.len() <= 75,
            "physical line exceeds 75 octets: {physical:?}"
        );
    }

    let unfolded = output.replace("\r\n ", "");
    assert!(unfolded.contains(&format!("SUMMARY:{long_summary}")));
}

#[test_log::test]
fn multibyte_text_survives_folding() {
    let summary = "カレンダーのテストです。".repeat(12);
    let mut cal = vobject::icalendar();
    let event = cal.add_component("VEVENT");
    event.add_line("uid").value = Value::Text("utf8@example.com".into());
    event.add_line("summary").value = Value::Text(summary.clone());

    let output = cal.serialize_default().unwrap();
    for physical in output.split("\r\n") {
        assert!(physical.len() <= 75);
        assert!(std::str::from_utf8(physical.as_bytes()).is_ok());
    }

    let reparsed = read_one(&output, &ParseOptions::default()).unwrap();
    let got = reparsed
        .component("vevent")
        .unwrap()
        .child_text("summary")
        .unwrap();
    assert_eq!(got, summary);
}

#[test_log::test]
fn value_may_contain_bare_colons_and_quotes() {
    let input = "BEGIN:VCALENDAR\r\n\
                 VERSION:2.0\r\n\
                 X-TEST;ALTREP=\"http://www.wiz.org\":value:;\"\r\n\
                 END:VCALENDAR\r\n";
    let cal = read_one(input, &ParseOptions::default()).unwrap();
    let line = cal.line("x-test").unwrap();
    assert_eq!(line.param("ALTREP"), Some("http://www.wiz.org"));
    assert_eq!(line.value.as_text(), Some("value:;\""));
}

#[test_log::test]
fn multi_valued_parameters_parse() {
    let input = "BEGIN:VCARD\r\n\
                 VERSION:3.0\r\n\
                 FN:John\r\n\
                 EMAIL;TYPE=\"blah\",hah;INTERNET=\"DIGI\",DERIDOO:john@nowhere.com\r\n\
                 END:VCARD\r\n";
    let card = read_one(input, &ParseOptions::default()).unwrap();
    let email = card.line("email").unwrap();
    assert_eq!(email.params("TYPE"), ["blah", "hah"]);
    assert_eq!(email.params("INTERNET"), ["DIGI", "DERIDOO"]);
    assert_eq!(email.value.as_text(), Some("john@nowhere.com"));
}

#[test_log::test]
fn unreadable_lines_can_be_skipped() {
    let input = "BEGIN:VCALENDAR\r\n\
                 VERSION:2.0\r\n\
                 !!!NOT A CONTENT LINE\r\n\
                 X-GOOD:fine\r\n\
                 END:VCALENDAR\r\n";
    assert!(read_one(input, &ParseOptions::default()).is_err());

    let lenient = ParseOptions {
        ignore_unreadable: true,
        ..ParseOptions::default()
    };
    let cal = read_one(input, &lenient).unwrap();
    assert_eq!(cal.child_text("x-good"), Some("fine"));
}

#[test_log::test]
fn escape_round_trip_through_native_text() {
    let original = "one\ntwo, three; four\\five";
    let mut cal = vobject::icalendar();
    let event = cal.add_component("VEVENT");
    event.add_line("uid").value = Value::Text("escape@example.com".into());
    event.add_line("description").value = Value::Text(original.into());

    let output = cal.serialize_default().unwrap();
    assert!(output.contains("DESCRIPTION:one\\ntwo\\, three\\; four\\\\five\r\n"));

    let reparsed = read_one(&output, &ParseOptions::default()).unwrap();
    assert_eq!(
        reparsed
            .component("vevent")
            .unwrap()
            .child_text("description"),
        Some(original)
    );
}
