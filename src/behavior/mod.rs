//! Behavior descriptors and the process-wide registry.
//!
//! A [`Behavior`] encapsulates the rules for one property or component
//! name (optionally disambiguated by a version string): textual
//! decode/encode, native-value conversion, validation, and implicit-field
//! generation. Behaviors are stateless, immutable descriptors; dispatch is
//! by the [`BehaviorKind`] tag rather than inheritance.

pub mod icalendar;
pub mod vcard;

use std::collections::HashMap;
use std::sync::{LazyLock, RwLock};

use crate::codec;
use crate::core::{Component, ContentLine, Node, Param, Value, normalize_name};
use crate::error::{ParseError, Result, ValidateError, VObjectError};

/// Cardinality and version hint for one known child name.
#[derive(Debug, Clone, Copy)]
pub struct ChildSpec {
    /// Child name, lowercased.
    pub name: &'static str,
    /// Minimum number of occurrences.
    pub min: u32,
    /// Maximum number of occurrences; `None` means unbounded.
    pub max: Option<u32>,
    /// Registry version used to resolve the child's behavior.
    pub version_hint: Option<&'static str>,
}

/// Shorthand constructor for [`ChildSpec`] tables.
#[must_use]
pub const fn spec(name: &'static str, min: u32, max: Option<u32>) -> ChildSpec {
    ChildSpec {
        name,
        min,
        max,
        version_hint: None,
    }
}

/// Tag selecting a behavior's decode/encode/native-conversion rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviorKind {
    /// No escaping at all (TZID, RRULE); commas and semicolons pass through.
    Raw,
    /// iCalendar text with backslash escapes; `ENCODING=BASE64` supported.
    Text,
    /// vCard text; `ENCODING=B` base64 plus the Apple `BASE64` singleton
    /// normalization.
    CardText,
    /// Multi-valued text split on a separator.
    MultiText {
        /// `,` for most properties, `;` for REQUEST-STATUS.
        separator: char,
    },
    /// A single DATE-TIME.
    DateTime,
    /// A DATE or DATE-TIME, disambiguated by the VALUE parameter and by
    /// shape.
    DateOrDateTime,
    /// One or more DATE, DATE-TIME, or PERIOD values (RDATE/EXDATE).
    MultiDate,
    /// A DURATION.
    Duration,
    /// A TRIGGER: DURATION by default, DATE-TIME on request.
    Trigger,
    /// One or more PERIOD values (FREEBUSY).
    Periods,
    /// The structured vCard N value.
    StructuredName,
    /// The structured vCard ADR value.
    StructuredAddress,
    /// The vCard ORG level list.
    OrgLevels,
    /// The VCALENDAR root.
    Calendar,
    /// A VTIMEZONE.
    Timezone,
    /// STANDARD / DAYLIGHT sub-components of a VTIMEZONE.
    Observance,
    /// Components that may recur: VEVENT, VTODO, VJOURNAL, AVAILABLE.
    Recurring,
    /// A VFREEBUSY component.
    FreeBusyComponent,
    /// A VALARM component.
    Alarm,
    /// A VAVAILABILITY component.
    Availability,
    /// A VCARD.
    Card,
    /// Any other component.
    Generic,
}

/// An immutable descriptor for one property or component name.
pub struct Behavior {
    /// Canonical (registration) name.
    pub name: &'static str,
    /// Version string this behavior applies to, when versioned.
    pub version: Option<&'static str>,
    /// Short human-readable description.
    pub description: &'static str,
    /// Dispatch tag.
    pub kind: BehaviorKind,
    /// Whether nodes with this behavior are components.
    pub is_component: bool,
    /// Whether values convert to a native domain type.
    pub has_native: bool,
    /// Whether date-time values must serialize in UTC.
    pub force_utc: bool,
    /// Whether a group prefix is meaningful (vCard).
    pub allow_group: bool,
    /// Whether serialized lines skip folding (the PHOTO quirk).
    pub unfolded: bool,
    /// Child names serialized ahead of all others, in order.
    pub sort_first: &'static [&'static str],
    /// Cardinalities of known children.
    pub known_children: &'static [ChildSpec],
    /// Behavior applied to unknown child lines of this component.
    pub default_line: Option<&'static Behavior>,
}

impl std::fmt::Debug for Behavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Behavior")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl Behavior {
    /// A base descriptor for struct-update construction of the tables.
    pub const DEFAULT: Behavior = Behavior {
        name: "",
        version: None,
        description: "",
        kind: BehaviorKind::Raw,
        is_component: false,
        has_native: false,
        force_utc: false,
        allow_group: false,
        unfolded: false,
        sort_first: &[],
        known_children: &[],
        default_line: None,
    };

    /// Looks up a child spec by (case-insensitive) name.
    #[must_use]
    pub fn known_child(&self, name: &str) -> Option<&ChildSpec> {
        self.known_children
            .iter()
            .find(|spec| spec.name.eq_ignore_ascii_case(name))
    }

    /// Decodes a line's raw wire text: escape expansion or base64.
    ///
    /// ## Errors
    /// Fails on invalid base64 payloads.
    pub fn decode(&self, line: &mut ContentLine) -> Result<()> {
        let Some(raw) = line.value.as_raw().map(str::to_string) else {
            return Ok(());
        };
        match self.kind {
            BehaviorKind::Text => {
                if line
                    .param("ENCODING")
                    .is_some_and(|e| e.eq_ignore_ascii_case("BASE64"))
                {
                    line.value = Value::Binary(codec::decode_base64(&raw)?);
                } else {
                    line.value = Value::Text(codec::unescape_text(&raw));
                }
            }
            BehaviorKind::CardText => {
                // Apple Address Book exports a bare BASE64 singleton instead
                // of ENCODING=b; normalize it before looking at ENCODING.
                if let Some(pos) = line
                    .singleton_params
                    .iter()
                    .position(|s| s.eq_ignore_ascii_case("BASE64"))
                {
                    line.singleton_params.remove(pos);
                    line.set_param("ENCODING", "B");
                }
                if line.has_param("ENCODING") {
                    line.value = Value::Binary(codec::decode_base64(&raw)?);
                } else {
                    line.value = Value::Text(codec::unescape_text(&raw));
                }
            }
            BehaviorKind::MultiText { separator } => {
                line.value = Value::TextList(codec::unescape_text_values(
                    &raw,
                    separator,
                    codec::ESCAPABLE_CHARS,
                ));
            }
            _ => {}
        }
        Ok(())
    }

    /// Re-encodes a decoded line back to its raw wire text in place.
    ///
    /// ## Errors
    /// Fails on values the behavior cannot render.
    pub fn encode(&self, line: &mut ContentLine) -> Result<()> {
        if line.value.is_raw() {
            return Ok(());
        }
        let (params, text) = self.wire(line)?;
        line.params = params;
        line.value = Value::Raw(text);
        Ok(())
    }

    /// Converts a line's value to its native domain type.
    ///
    /// ## Errors
    /// Fails on malformed values; callers fill in the line number.
    pub fn transform_to_native(&self, line: &mut ContentLine) -> Result<()> {
        if !self.has_native || line.is_native() {
            return Ok(());
        }
        let Some(raw) = line.value.as_text().map(str::to_string) else {
            return Ok(());
        };
        if raw.is_empty() {
            return Ok(());
        }
        match self.kind {
            BehaviorKind::DateTime => transform_datetime(line, &raw, true)?,
            BehaviorKind::DateOrDateTime => transform_date_or_datetime(line, &raw)?,
            BehaviorKind::MultiDate => transform_multi_date(line, &raw)?,
            BehaviorKind::Duration => {
                let deltas = codec::parse_durations(&raw)?;
                match deltas.as_slice() {
                    [single] => line.value = Value::Duration(*single),
                    _ => {
                        return Err(ParseError::new(
                            "DURATION must have a single duration string",
                        )
                        .into());
                    }
                }
            }
            BehaviorKind::Trigger => transform_trigger(line, &raw)?,
            BehaviorKind::Periods => {
                let tzid = line.param("TZID").map(str::to_string);
                let periods = raw
                    .split(',')
                    .map(|p| codec::parse_period(p, tzid.as_deref()))
                    .collect::<Result<Vec<_>>>()?;
                line.value = Value::Periods(periods);
            }
            BehaviorKind::StructuredName => {
                line.value = Value::Name(vcard::parse_name(&raw));
            }
            BehaviorKind::StructuredAddress => {
                line.value = Value::Address(vcard::parse_address(&raw));
            }
            BehaviorKind::OrgLevels => {
                line.value = Value::Org(vcard::parse_org(&raw));
            }
            _ => {}
        }
        Ok(())
    }

    /// Converts a native value back to raw wire text in place.
    ///
    /// ## Errors
    /// Fails when the native value cannot be rendered.
    pub fn transform_from_native(&self, line: &mut ContentLine) -> Result<()> {
        if !self.has_native || !line.is_native() {
            return Ok(());
        }
        let (params, text) = self.wire(line)?;
        line.params = params;
        line.value = Value::Raw(text);
        Ok(())
    }

    /// Renders a line to wire form without mutating it: the effective
    /// parameter list and the encoded value text.
    ///
    /// ## Errors
    /// Fails on native values this behavior cannot render.
    pub(crate) fn wire(&self, line: &ContentLine) -> Result<(Vec<Param>, String)> {
        let mut params = line.params.clone();

        let text = match (&self.kind, &line.value) {
            (_, Value::Raw(s)) => s.clone(),

            (BehaviorKind::Raw, Value::Text(s)) => s.clone(),

            (BehaviorKind::Text | BehaviorKind::CardText, Value::Text(s)) => {
                codec::backslash_escape(s)
            }
            (BehaviorKind::Text | BehaviorKind::CardText, Value::Binary(data)) => {
                codec::encode_base64(data)
            }
            (BehaviorKind::Text | BehaviorKind::CardText, Value::TextList(values)) => values
                .iter()
                .map(|v| codec::backslash_escape(v))
                .collect::<Vec<_>>()
                .join(","),

            (BehaviorKind::MultiText { separator }, Value::TextList(values)) => values
                .iter()
                .map(|v| codec::backslash_escape(v))
                .collect::<Vec<_>>()
                .join(&separator.to_string()),
            (BehaviorKind::MultiText { .. }, Value::Text(s)) => codec::backslash_escape(s),

            (
                BehaviorKind::DateTime | BehaviorKind::DateOrDateTime | BehaviorKind::Trigger,
                Value::DateTime(dt),
            ) => {
                restore_tzid_params(&mut params, dt, self.force_utc);
                if matches!(self.kind, BehaviorKind::Trigger) {
                    set_param(&mut params, "VALUE", "DATE-TIME");
                }
                codec::datetime_to_string(dt, self.force_utc)
            }
            (BehaviorKind::DateOrDateTime, Value::Date(d)) => {
                set_param(&mut params, "VALUE", "DATE");
                codec::date_to_string(*d)
            }

            (BehaviorKind::MultiDate, Value::DateList(dates)) => {
                set_param(&mut params, "VALUE", "DATE");
                dates
                    .iter()
                    .map(|d| codec::date_to_string(*d))
                    .collect::<Vec<_>>()
                    .join(",")
            }
            (BehaviorKind::MultiDate, Value::DateTimeList(values)) => {
                if let Some(zoned) = values.iter().find(|v| v.tzid().is_some())
                    && !has_param(&params, "TZID")
                {
                    set_param(&mut params, "TZID", zoned.tzid().unwrap_or_default());
                }
                values
                    .iter()
                    .map(|v| codec::datetime_to_string(v, false))
                    .collect::<Vec<_>>()
                    .join(",")
            }
            (BehaviorKind::MultiDate | BehaviorKind::Periods, Value::Periods(periods)) => {
                if !self.force_utc
                    && let Some(zoned) = periods.iter().find(|p| p.start.tzid().is_some())
                    && !has_param(&params, "TZID")
                {
                    set_param(&mut params, "TZID", zoned.start.tzid().unwrap_or_default());
                }
                periods
                    .iter()
                    .map(|p| codec::period_to_string(p, self.force_utc))
                    .collect::<Vec<_>>()
                    .join(",")
            }

            (BehaviorKind::Duration | BehaviorKind::Trigger, Value::Duration(delta)) => {
                codec::timedelta_to_string(*delta)
            }

            (BehaviorKind::StructuredName, Value::Name(name)) => vcard::serialize_name(name),
            (BehaviorKind::StructuredAddress, Value::Address(adr)) => {
                vcard::serialize_address(adr)
            }
            (BehaviorKind::OrgLevels, Value::Org(levels)) => vcard::serialize_org(levels),

            (_, value) => {
                return Err(VObjectError::usage(format!(
                    "behavior {} cannot serialize value {value:?}",
                    self.name
                )));
            }
        };
        Ok((params, text))
    }

    /// Checks cardinalities and behavior-specific rules.
    ///
    /// ## Errors
    /// Returns the first violated rule.
    pub fn validate_component(&self, comp: &Component) -> std::result::Result<(), ValidateError> {
        // VALARM validation is intentionally lax, matching established
        // producer behavior.
        if self.kind == BehaviorKind::Alarm {
            return Ok(());
        }

        match self.kind {
            BehaviorKind::Timezone => {
                if comp.child_value("tzid").is_none() {
                    return Err(ValidateError::new(
                        "VTIMEZONE components must contain a valid TZID",
                    ));
                }
                if !comp.contains("standard") && !comp.contains("daylight") {
                    return Err(ValidateError::new(
                        "VTIMEZONE components must contain a STANDARD or a DAYLIGHT component",
                    ));
                }
            }
            BehaviorKind::Recurring => match self.name {
                "VEVENT" => {
                    if comp.contains("dtend") && comp.contains("duration") {
                        return Err(ValidateError::new(
                            "VEVENT components cannot contain both DTEND and DURATION",
                        ));
                    }
                }
                "VTODO" => {
                    if comp.contains("due") && comp.contains("duration") {
                        return Err(ValidateError::new(
                            "VTODO components cannot contain both DUE and DURATION",
                        ));
                    }
                }
                "AVAILABLE" => {
                    let has_dtend = comp.contains("dtend");
                    let has_duration = comp.contains("duration");
                    if has_dtend && has_duration {
                        return Err(ValidateError::new(
                            "AVAILABLE components cannot contain both DTEND and DURATION",
                        ));
                    }
                    if !has_dtend && !has_duration {
                        return Err(ValidateError::new(
                            "AVAILABLE components must contain one of DTEND or DURATION",
                        ));
                    }
                }
                _ => {}
            },
            BehaviorKind::Availability => {
                if comp.contains("dtend") && comp.contains("duration") {
                    return Err(ValidateError::new(
                        "VAVAILABILITY components cannot contain both DTEND and DURATION",
                    ));
                }
            }
            _ => {}
        }

        for spec in self.known_children {
            let count = comp.children(spec.name).len() as u32;
            if count < spec.min {
                return Err(ValidateError::new(format!(
                    "{} components must contain at least {} {} child(ren)",
                    comp.name,
                    spec.min,
                    spec.name.to_ascii_uppercase()
                )));
            }
            if let Some(max) = spec.max
                && count > max
            {
                return Err(ValidateError::new(format!(
                    "{} components must contain at most {} {} child(ren)",
                    comp.name,
                    max,
                    spec.name.to_ascii_uppercase()
                )));
            }
        }

        for child in comp.components() {
            child
                .behavior
                .map_or(Ok(()), |b| b.validate_component(child))?;
        }
        Ok(())
    }

    /// Generates implicit children and parameters before serialization.
    ///
    /// ## Errors
    /// Propagates timezone-synthesis failures.
    pub fn generate_implicit(&self, comp: &mut Component) -> Result<()> {
        match self.kind {
            BehaviorKind::Calendar => icalendar::generate_calendar_implicits(comp),
            BehaviorKind::Recurring => {
                icalendar::generate_recurring_implicits(comp);
                Ok(())
            }
            BehaviorKind::Alarm => {
                icalendar::generate_alarm_implicits(comp);
                Ok(())
            }
            BehaviorKind::Card => {
                vcard::generate_card_implicits(comp);
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn has_param(params: &[Param], name: &str) -> bool {
    params.iter().any(|p| p.name.eq_ignore_ascii_case(name))
}

fn set_param(params: &mut Vec<Param>, name: &str, value: &str) {
    if let Some(p) = params
        .iter_mut()
        .find(|p| p.name.eq_ignore_ascii_case(name))
    {
        p.values = vec![value.to_string()];
    } else {
        params.push(Param::new(name, value));
    }
}

fn remove_param(params: &mut Vec<Param>, name: &str) -> Option<Vec<String>> {
    let idx = params
        .iter()
        .position(|p| p.name.eq_ignore_ascii_case(name))?;
    Some(params.remove(idx).values)
}

/// Restores the TZID parameter from the zone attachment or from a
/// round-tripped `X-VOBJ-ORIGINAL-TZID`.
fn restore_tzid_params(params: &mut Vec<Param>, dt: &crate::core::DateTimeValue, force_utc: bool) {
    let original = remove_param(params, "X-VOBJ-ORIGINAL-TZID");
    remove_param(params, "TZID");
    if force_utc {
        return;
    }
    if let Some(tzid) = dt.tzid() {
        set_param(params, "TZID", tzid);
    } else if let Some(values) = original
        && let Some(first) = values.first()
        && !dt.is_utc()
    {
        set_param(params, "TZID", first);
    }
}

fn transform_datetime(line: &mut ContentLine, raw: &str, tag_floating: bool) -> Result<()> {
    let tzid = line.param("TZID").map(str::to_string);
    let value = codec::parse_datetime(raw, tzid.as_deref())?;
    if tag_floating && value.is_floating() {
        line.set_param("X-VOBJ-FLOATINGTIME-ALLOWED", "TRUE");
    }
    if let Some(values) = line.remove_param("TZID") {
        line.set_param_values("X-VOBJ-ORIGINAL-TZID", values);
    }
    line.value = Value::DateTime(value);
    Ok(())
}

fn transform_date_or_datetime(line: &mut ContentLine, raw: &str) -> Result<()> {
    let value_param = line
        .param("VALUE")
        .unwrap_or("DATE-TIME")
        .to_ascii_uppercase();
    if value_param == "DATE" {
        line.value = Value::Date(codec::parse_date(raw)?);
        return Ok(());
    }
    // Various producers omit VALUE=DATE on date values; accept the
    // signature mismatch.
    let tzid = line.param("TZID").map(str::to_string);
    match codec::parse_datetime(raw, tzid.as_deref()) {
        Ok(value) => {
            if let Some(values) = line.remove_param("TZID") {
                line.set_param_values("X-VOBJ-ORIGINAL-TZID", values);
            }
            line.value = Value::DateTime(value);
            Ok(())
        }
        Err(_) => {
            line.value = Value::Date(codec::parse_date(raw)?);
            Ok(())
        }
    }
}

fn transform_multi_date(line: &mut ContentLine, raw: &str) -> Result<()> {
    let tzid = line.param("TZID").map(str::to_string);
    let value_param = line
        .param("VALUE")
        .unwrap_or("DATE-TIME")
        .to_ascii_uppercase();
    line.value = match value_param.as_str() {
        "DATE" => Value::DateList(
            raw.split(',')
                .map(codec::parse_date)
                .collect::<Result<Vec<_>>>()?,
        ),
        "PERIOD" => Value::Periods(
            raw.split(',')
                .map(|p| codec::parse_period(p, tzid.as_deref()))
                .collect::<Result<Vec<_>>>()?,
        ),
        _ => Value::DateTimeList(
            raw.split(',')
                .map(|s| codec::parse_datetime(s, tzid.as_deref()))
                .collect::<Result<Vec<_>>>()?,
        ),
    };
    Ok(())
}

fn transform_trigger(line: &mut ContentLine, raw: &str) -> Result<()> {
    let value_param = line
        .param("VALUE")
        .unwrap_or("DURATION")
        .to_ascii_uppercase();
    line.remove_param("VALUE");
    match value_param.as_str() {
        "DURATION" => match codec::parse_durations(raw) {
            Ok(deltas) if deltas.len() == 1 => {
                line.value = Value::Duration(deltas[0]);
                Ok(())
            }
            _ => {
                // iCal sometimes exports DATE-TIME triggers without
                // VALUE=DATE-TIME.
                tracing::warn!(
                    "TRIGGER not recognized as DURATION, trying DATE-TIME"
                );
                transform_datetime(line, raw, false).map_err(|_| {
                    ParseError::new("TRIGGER with no VALUE not recognized as DURATION or DATE-TIME")
                        .into()
                })
            }
        },
        "DATE-TIME" => transform_datetime(line, raw, false),
        _ => Err(ParseError::new("TRIGGER VALUE must be DURATION or DATE-TIME").into()),
    }
}

// ------------------------------------------------------------- registry ----

type Entry = (Option<String>, &'static Behavior);

/// Maps `(NAME, version?)` to behaviors; the first entry for a name is its
/// default.
#[derive(Default)]
pub struct Registry {
    map: HashMap<String, Vec<Entry>>,
}

impl Registry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry populated with the standard iCalendar and vCard tables.
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::new();
        icalendar::register_all(&mut registry);
        vcard::register_all(&mut registry);
        registry
    }

    /// Registers a behavior, optionally under an explicit name or version.
    ///
    /// With `default` the behavior becomes the head entry for its name.
    pub fn register(
        &mut self,
        behavior: &'static Behavior,
        name: Option<&str>,
        default: bool,
        version: Option<&str>,
    ) {
        let key = normalize_name(name.unwrap_or(behavior.name));
        let version = version.or(behavior.version).map(str::to_string);
        let entries = self.map.entry(key).or_default();
        if default {
            entries.insert(0, (version, behavior));
        } else {
            entries.push((version, behavior));
        }
    }

    /// Looks up a behavior; an exact `(name, version)` match wins, else the
    /// default for the name.
    #[must_use]
    pub fn get(&self, name: &str, version: Option<&str>) -> Option<&'static Behavior> {
        let entries = self.map.get(&normalize_name(name))?;
        if let Some(version) = version {
            for (entry_version, behavior) in entries {
                if entry_version.as_deref() == Some(version) {
                    return Some(behavior);
                }
            }
        }
        entries.first().map(|(_, b)| *b)
    }
}

static REGISTRY: LazyLock<RwLock<Registry>> = LazyLock::new(|| RwLock::new(Registry::standard()));

/// Looks up a behavior in the process-default registry.
#[must_use]
pub fn get_behavior(name: &str, version: Option<&str>) -> Option<&'static Behavior> {
    REGISTRY
        .read()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .get(name, version)
}

/// Extends the process-default registry.
pub fn register_behavior(
    behavior: &'static Behavior,
    name: Option<&str>,
    default: bool,
    version: Option<&str>,
) {
    REGISTRY
        .write()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .register(behavior, name, default, version);
}

/// Builds an empty node bound to the behavior registered for `name`.
///
/// ## Errors
/// Fails when no behavior is registered under the name.
pub fn new_from_behavior(name: &str, version: Option<&str>) -> Result<Node> {
    let upper = normalize_name(name);
    let behavior = get_behavior(&upper, version)
        .ok_or_else(|| VObjectError::usage(format!("no behavior found named {upper}")))?;
    if behavior.is_component {
        let mut comp = Component::new(&upper);
        comp.behavior = Some(behavior);
        Ok(Node::Component(comp))
    } else {
        let mut line = ContentLine::new(&upper);
        line.behavior = Some(behavior);
        Ok(Node::Line(line))
    }
}
