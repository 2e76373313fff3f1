//! Parse, model, mutate, and re-serialize iCalendar (RFC 5545) and vCard
//! (RFC 2425/2426) streams.
//!
//! Reading turns a text stream into a tree of [`Component`]s holding
//! [`ContentLine`]s. As each component closes, a [`behavior::Behavior`] is
//! resolved from the registry by name and version; behaviors decode
//! backslash escapes, base64, and quoted-printable content, and transform
//! values into native types ([`Value`]): dates, date-times, durations,
//! periods, and structured names and addresses. Components carrying
//! recurrence information expand through [`Component::get_rruleset`];
//! VTIMEZONE components convert to and from timezone objects.
//!
//! Writing is the inverse: implicit fields (UID, DTSTAMP, PRODID, VERSION,
//! missing VTIMEZONEs) are generated, values are encoded, and every
//! logical line is folded at 75 octets without ever splitting a UTF-8
//! sequence.
//!
//! ```
//! let input = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:a@b\r\nDTSTAMP:20060509T000000Z\r\nDTSTART:20060509T120000Z\r\nSUMMARY:lunch\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
//! let mut cal = vobject::read_one(input, &vobject::ParseOptions::default()).unwrap();
//! assert_eq!(
//!     cal.component("vevent").unwrap().child_text("summary"),
//!     Some("lunch")
//! );
//! let output = cal.serialize_default().unwrap();
//! assert!(output.starts_with("BEGIN:VCALENDAR\r\n"));
//! ```

pub mod behavior;
pub mod build;
pub mod codec;
pub mod core;
pub mod error;
pub mod parse;
pub mod recur;
pub mod tz;

pub use crate::behavior::{Behavior, BehaviorKind, Registry, get_behavior, new_from_behavior, register_behavior};
pub use crate::core::{
    Address, Component, ContentLine, DateTimeValue, Name, Node, Param, Period, PeriodEnd, Value,
    Zone,
};
pub use crate::error::{NativeError, ParseError, Result, ValidateError, VObjectError};
pub use crate::parse::{ParseOptions, read_components, read_one};
pub use crate::recur::{Recur, RecurrenceSet};
pub use crate::tz::{TzSource, get_tzid, register_tzid, unregister_tzid};

/// An empty iCalendar (VCALENDAR 2.0) component.
#[must_use]
pub fn icalendar() -> Component {
    let mut comp = Component::new("VCALENDAR");
    comp.behavior = get_behavior("VCALENDAR", Some("2.0"));
    comp
}

/// An empty vCard 3.0 component.
#[must_use]
pub fn vcard() -> Component {
    let mut comp = Component::new("VCARD");
    comp.behavior = get_behavior("VCARD", Some("3.0"));
    comp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_bind_behaviors() {
        assert_eq!(icalendar().behavior.unwrap().version, Some("2.0"));
        assert_eq!(vcard().behavior.unwrap().version, Some("3.0"));
    }
}
