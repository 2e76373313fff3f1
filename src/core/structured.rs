//! Structured vCard values: N, ADR, and ORG.

use std::fmt;

/// Structured name (the vCard `N` property).
///
/// Fields appear on the wire in the order
/// `family;given;additional;prefix;suffix`. Each field is a comma-separated
/// list; a plain name is a one-element list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Name {
    /// Family names (surnames).
    pub family: Vec<String>,
    /// Given names.
    pub given: Vec<String>,
    /// Additional (middle) names.
    pub additional: Vec<String>,
    /// Honorific prefixes.
    pub prefix: Vec<String>,
    /// Honorific suffixes.
    pub suffix: Vec<String>,
}

impl Name {
    /// Creates an empty name.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a name from single family and given components.
    #[must_use]
    pub fn simple(family: impl Into<String>, given: impl Into<String>) -> Self {
        Self {
            family: vec![family.into()],
            given: vec![given.into()],
            ..Self::default()
        }
    }

    /// Whether every component is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.family.is_empty()
            && self.given.is_empty()
            && self.additional.is_empty()
            && self.prefix.is_empty()
            && self.suffix.is_empty()
    }

    /// Fields in wire order.
    #[must_use]
    pub fn fields(&self) -> [&Vec<String>; 5] {
        [
            &self.family,
            &self.given,
            &self.additional,
            &self.prefix,
            &self.suffix,
        ]
    }

    /// Assigns the field at `index` in wire order.
    pub(crate) fn set_field(&mut self, index: usize, values: Vec<String>) {
        match index {
            0 => self.family = values,
            1 => self.given = values,
            2 => self.additional = values,
            3 => self.prefix = values,
            4 => self.suffix = values,
            _ => {}
        }
    }
}

impl fmt::Display for Name {
    /// English reading order: prefix, given, additional, family, suffix.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let order = [
            &self.prefix,
            &self.given,
            &self.additional,
            &self.family,
            &self.suffix,
        ];
        let joined: Vec<String> = order
            .iter()
            .filter(|v| !v.is_empty())
            .map(|v| v.join(" "))
            .collect();
        write!(f, "{}", joined.join(" "))
    }
}

/// Structured address (the vCard `ADR` property).
///
/// Wire order: `box;extended;street;city;region;code;country`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Address {
    /// Post office box.
    pub po_box: Vec<String>,
    /// Extended address (apartment, suite).
    pub extended: Vec<String>,
    /// Street address.
    pub street: Vec<String>,
    /// City or locality.
    pub city: Vec<String>,
    /// State, province, or region.
    pub region: Vec<String>,
    /// Postal code.
    pub code: Vec<String>,
    /// Country.
    pub country: Vec<String>,
}

impl Address {
    /// Creates an empty address.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether every component is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|v| v.is_empty())
    }

    /// Fields in wire order.
    #[must_use]
    pub fn fields(&self) -> [&Vec<String>; 7] {
        [
            &self.po_box,
            &self.extended,
            &self.street,
            &self.city,
            &self.region,
            &self.code,
            &self.country,
        ]
    }

    /// Assigns the field at `index` in wire order.
    pub(crate) fn set_field(&mut self, index: usize, values: Vec<String>) {
        match index {
            0 => self.po_box = values,
            1 => self.extended = values,
            2 => self.street = values,
            3 => self.city = values,
            4 => self.region = values,
            5 => self.code = values,
            6 => self.country = values,
            _ => {}
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines: Vec<String> = [&self.po_box, &self.extended, &self.street]
            .iter()
            .filter(|v| !v.is_empty())
            .map(|v| v.join("\n"))
            .collect();
        lines.push(format!(
            "{}, {} {}",
            self.city.join(" "),
            self.region.join(" "),
            self.code.join(" ")
        ));
        if !self.country.is_empty() {
            lines.push(self.country.join("\n"));
        }
        write!(f, "{}", lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_display_reading_order() {
        let name = Name {
            family: vec!["Doe".into()],
            given: vec!["John".into()],
            prefix: vec!["Dr.".into()],
            ..Name::default()
        };
        assert_eq!(name.to_string(), "Dr. John Doe");
    }

    #[test]
    fn name_simple_round_fields() {
        let name = Name::simple("Doe", "Jane");
        assert_eq!(name.fields()[0], &vec!["Doe".to_string()]);
        assert_eq!(name.fields()[1], &vec!["Jane".to_string()]);
        assert!(!name.is_empty());
    }

    #[test]
    fn address_display() {
        let adr = Address {
            street: vec!["123 Main St".into()],
            city: vec!["Anytown".into()],
            region: vec!["CA".into()],
            code: vec!["12345".into()],
            country: vec!["USA".into()],
            ..Address::default()
        };
        assert_eq!(adr.to_string(), "123 Main St\nAnytown, CA 12345\nUSA");
    }

    #[test]
    fn empty_address() {
        assert!(Address::new().is_empty());
    }
}
