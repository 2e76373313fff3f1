//! vCard 3.0 behavior table, structured-value codecs, and implicit fields.

use crate::codec::{self, ESCAPABLE_CHARS};
use crate::core::{Address, Component, Name, Value};

use super::{Behavior, BehaviorKind, Registry, spec};

/// vCard text: backslash escapes plus `ENCODING=b` base64, with the Apple
/// Address Book `BASE64` singleton normalized during decode.
pub static CARD_TEXT: Behavior = Behavior {
    name: "VCARD-TEXT",
    description: "Escaped text value with optional base64 encoding.",
    kind: BehaviorKind::CardText,
    allow_group: true,
    ..Behavior::DEFAULT
};

/// PHOTO serializes without folding: Apple's Address Book expects base64
/// data with very specific whitespace, and copes when it is not wrapped.
pub static PHOTO: Behavior = Behavior {
    name: "PHOTO",
    description: "Photograph.",
    kind: BehaviorKind::CardText,
    allow_group: true,
    unfolded: true,
    ..Behavior::DEFAULT
};

/// The structured N property.
pub static N: Behavior = Behavior {
    name: "N",
    description: "A structured name.",
    kind: BehaviorKind::StructuredName,
    has_native: true,
    allow_group: true,
    ..Behavior::DEFAULT
};

/// The structured ADR property.
pub static ADR: Behavior = Behavior {
    name: "ADR",
    description: "A structured address.",
    kind: BehaviorKind::StructuredAddress,
    has_native: true,
    allow_group: true,
    ..Behavior::DEFAULT
};

/// The ORG property: a sequence of organisation levels.
pub static ORG: Behavior = Behavior {
    name: "ORG",
    description: "Organisation and sub-organisation levels.",
    kind: BehaviorKind::OrgLevels,
    has_native: true,
    allow_group: true,
    ..Behavior::DEFAULT
};

/// The VCARD component, vCard 3.0.
pub static VCARD3: Behavior = Behavior {
    name: "VCARD",
    version: Some("3.0"),
    description: "vCard 3.0, defined in rfc2426.",
    kind: BehaviorKind::Card,
    is_component: true,
    allow_group: true,
    sort_first: &["version", "prodid", "uid"],
    known_children: &[
        spec("N", 0, Some(1)),
        spec("FN", 1, None),
        spec("VERSION", 1, Some(1)),
        spec("PRODID", 0, Some(1)),
        spec("LABEL", 0, None),
        spec("UID", 0, None),
        spec("ADR", 0, None),
        spec("ORG", 0, None),
        spec("PHOTO", 0, None),
        spec("CATEGORIES", 0, None),
    ],
    default_line: Some(&CARD_TEXT),
    ..Behavior::DEFAULT
};

/// Registers the full vCard table.
pub fn register_all(registry: &mut Registry) {
    registry.register(&VCARD3, None, true, None);
    registry.register(&CARD_TEXT, Some("FN"), false, None);
    registry.register(&CARD_TEXT, Some("LABEL"), false, None);
    registry.register(&PHOTO, None, false, None);
    registry.register(&N, None, false, None);
    registry.register(&ADR, None, false, None);
    registry.register(&ORG, None, false, None);
}

/// Generates a VERSION line when missing on a VCARD.
pub(crate) fn generate_card_implicits(comp: &mut Component) {
    if !comp.contains("version") {
        comp.add_line("version").value = Value::Text("3.0".into());
    }
}

// ------------------------------------------------- structured values ----

/// Splits a structured value into `;`-separated fields, each of which is a
/// `,`-separated list of escaped values.
fn split_fields(s: &str) -> Vec<Vec<String>> {
    codec::unescape_text_values(s, ';', ";")
        .into_iter()
        .map(|field| {
            if field.is_empty() {
                Vec::new()
            } else {
                codec::unescape_text_values(&field, ',', ESCAPABLE_CHARS)
                    .into_iter()
                    .filter(|v| !v.is_empty())
                    .collect()
            }
        })
        .collect()
}

/// Unescapes one field without splitting it on commas.
fn unescape_field(field: &str) -> String {
    codec::unescape_text_values(field, '\u{0}', ESCAPABLE_CHARS)
        .into_iter()
        .next()
        .unwrap_or_default()
}

/// Parses the N value: `family;given;additional;prefix;suffix`.
pub(crate) fn parse_name(s: &str) -> Name {
    let mut name = Name::new();
    for (index, values) in split_fields(s).into_iter().enumerate().take(5) {
        name.set_field(index, values);
    }
    name
}

/// Parses the ADR value: `box;extended;street;city;region;code;country`.
pub(crate) fn parse_address(s: &str) -> Address {
    let mut address = Address::new();
    for (index, values) in split_fields(s).into_iter().enumerate().take(7) {
        address.set_field(index, values);
    }
    address
}

/// Parses the ORG value: `;`-separated organisation levels.
pub(crate) fn parse_org(s: &str) -> Vec<String> {
    codec::unescape_text_values(s, ';', ";")
        .into_iter()
        .map(|level| unescape_field(&level))
        .collect()
}

fn serialize_field(values: &[String]) -> String {
    values
        .iter()
        .map(|v| codec::backslash_escape(v))
        .collect::<Vec<_>>()
        .join(",")
}

/// Serializes an N value in wire field order.
pub(crate) fn serialize_name(name: &Name) -> String {
    name.fields()
        .iter()
        .map(|f| serialize_field(f))
        .collect::<Vec<_>>()
        .join(";")
}

/// Serializes an ADR value in wire field order.
pub(crate) fn serialize_address(address: &Address) -> String {
    address
        .fields()
        .iter()
        .map(|f| serialize_field(f))
        .collect::<Vec<_>>()
        .join(";")
}

/// Serializes an ORG value.
pub(crate) fn serialize_org(levels: &[String]) -> String {
    levels
        .iter()
        .map(|level| codec::backslash_escape(level))
        .collect::<Vec<_>>()
        .join(";")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_round_trip() {
        let name = parse_name("Doe;John;;Dr.;Jr.");
        assert_eq!(name.family, ["Doe"]);
        assert_eq!(name.given, ["John"]);
        assert!(name.additional.is_empty());
        assert_eq!(name.prefix, ["Dr."]);
        assert_eq!(name.suffix, ["Jr."]);
        assert_eq!(serialize_name(&name), "Doe;John;;Dr.;Jr.");
    }

    #[test]
    fn name_with_multi_valued_field() {
        let name = parse_name("Doe;John,Jack;;;");
        assert_eq!(name.given, ["John", "Jack"]);
        assert_eq!(serialize_name(&name), "Doe;John,Jack;;;");
    }

    #[test]
    fn address_round_trip() {
        let adr = parse_address(";;123 Main St;Anytown;CA;12345;USA");
        assert_eq!(adr.street, ["123 Main St"]);
        assert_eq!(adr.city, ["Anytown"]);
        assert_eq!(adr.country, ["USA"]);
        assert_eq!(
            serialize_address(&adr),
            ";;123 Main St;Anytown;CA;12345;USA"
        );
    }

    #[test]
    fn escaped_semicolon_stays_in_field() {
        let name = parse_name("Doe\\;Smith;Jane;;;");
        assert_eq!(name.family, ["Doe;Smith"]);
        assert_eq!(serialize_name(&name), "Doe\\;Smith;Jane;;;");
    }

    #[test]
    fn org_levels() {
        let org = parse_org("Acme Inc.;Engineering;Backend");
        assert_eq!(org, ["Acme Inc.", "Engineering", "Backend"]);
        assert_eq!(serialize_org(&org), "Acme Inc.;Engineering;Backend");
    }

    #[test]
    fn org_with_escaped_comma() {
        let org = parse_org("Acme\\, Inc.");
        assert_eq!(org, ["Acme, Inc."]);
        assert_eq!(serialize_org(&org), "Acme\\, Inc.");
    }
}
