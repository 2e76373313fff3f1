//! One content line of a vCard or vCalendar stream.

use crate::behavior::Behavior;

use super::value::Value;

/// Normalizes a property or parameter name: uppercase, underscores (used by
/// some legacy producers) replaced with dashes.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.to_ascii_uppercase().replace('_', "-")
}

/// A single property parameter: a name and its ordered values.
///
/// Parameter names compare case-insensitively; values preserve case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// Parameter name, normalized to uppercase.
    pub name: String,
    /// Values in order of appearance.
    pub values: Vec<String>,
}

impl Param {
    /// Creates a parameter with a single value.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: normalize_name(&name.into()),
            values: vec![value.into()],
        }
    }

    /// Creates a parameter with multiple values.
    #[must_use]
    pub fn with_values(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: normalize_name(&name.into()),
            values,
        }
    }

    /// The first value, if any.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }
}

/// Holds one logical line: `group.NAME;PARAM=val,val:value`.
#[derive(Debug, Clone)]
pub struct ContentLine {
    /// Uppercased property name.
    pub name: String,
    /// Optional group prefix (vCard grouping, RFC 2425).
    pub group: Option<String>,
    /// Parameters in order of appearance.
    pub params: Vec<Param>,
    /// Bare parameter tokens without `=` (vCard 2.1 allows unlabelled
    /// parameter values).
    pub singleton_params: Vec<String>,
    /// The value, raw or native.
    pub value: Value,
    /// 1-based source line for diagnostics, when parsed from text.
    pub line_number: Option<usize>,
    /// The behavior bound to this line, when resolved.
    pub behavior: Option<&'static Behavior>,
}

impl ContentLine {
    /// Creates an empty, non-encoded line with the given name.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: normalize_name(name),
            group: None,
            params: Vec::new(),
            singleton_params: Vec::new(),
            value: Value::empty(),
            line_number: None,
            behavior: None,
        }
    }

    /// Creates a line with a raw on-wire value.
    #[must_use]
    pub fn with_value(name: &str, value: impl Into<String>) -> Self {
        let mut line = Self::new(name);
        line.value = Value::Raw(value.into());
        line
    }

    /// Whether the value is still in on-wire form.
    #[must_use]
    pub fn is_encoded(&self) -> bool {
        self.value.is_raw()
    }

    /// Whether the value has been transformed into a domain type.
    #[must_use]
    pub fn is_native(&self) -> bool {
        self.value.is_native()
    }

    /// First value of the named parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.param_entry(name).and_then(Param::value)
    }

    /// All values of the named parameter, empty when absent.
    #[must_use]
    pub fn params(&self, name: &str) -> &[String] {
        self.param_entry(name).map_or(&[], |p| p.values.as_slice())
    }

    /// Whether the named parameter is present.
    #[must_use]
    pub fn has_param(&self, name: &str) -> bool {
        self.param_entry(name).is_some()
    }

    /// The parameter record itself.
    #[must_use]
    pub fn param_entry(&self, name: &str) -> Option<&Param> {
        self.params
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Sets a parameter to a single value, replacing any existing values.
    pub fn set_param(&mut self, name: &str, value: impl Into<String>) {
        self.set_param_values(name, vec![value.into()]);
    }

    /// Sets a parameter to the given values, replacing any existing entry.
    pub fn set_param_values(&mut self, name: &str, values: Vec<String>) {
        let normalized = normalize_name(name);
        if let Some(existing) = self
            .params
            .iter_mut()
            .find(|p| p.name.eq_ignore_ascii_case(&normalized))
        {
            existing.values = values;
        } else {
            self.params.push(Param {
                name: normalized,
                values,
            });
        }
    }

    /// Appends a value to a parameter, creating it when missing.
    pub fn add_param_value(&mut self, name: &str, value: impl Into<String>) {
        let normalized = normalize_name(name);
        if let Some(existing) = self
            .params
            .iter_mut()
            .find(|p| p.name.eq_ignore_ascii_case(&normalized))
        {
            existing.values.push(value.into());
        } else {
            self.params.push(Param {
                name: normalized,
                values: vec![value.into()],
            });
        }
    }

    /// Removes a parameter, returning its values.
    pub fn remove_param(&mut self, name: &str) -> Option<Vec<String>> {
        let idx = self
            .params
            .iter()
            .position(|p| p.name.eq_ignore_ascii_case(name))?;
        Some(self.params.remove(idx).values)
    }
}

/// Structural equality: name, parameters, and value; group and diagnostics
/// are ignored, matching the source format's notion of equivalence.
/// Parameters compare as an unordered table.
impl PartialEq for ContentLine {
    fn eq(&self, other: &Self) -> bool {
        if self.name != other.name || self.value != other.value {
            return false;
        }
        let mut ours: Vec<&Param> = self.params.iter().collect();
        let mut theirs: Vec<&Param> = other.params.iter().collect();
        ours.sort_by(|a, b| a.name.cmp(&b.name));
        theirs.sort_by(|a, b| a.name.cmp(&b.name));
        ours == theirs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_uppercases_and_dashes() {
        assert_eq!(normalize_name("x_test"), "X-TEST");
        assert_eq!(normalize_name("dtstart"), "DTSTART");
    }

    #[test]
    fn param_lookup_is_case_insensitive() {
        let mut line = ContentLine::new("EMAIL");
        line.set_param_values("TYPE", vec!["blah".into(), "hah".into()]);
        assert_eq!(line.param("type"), Some("blah"));
        assert_eq!(line.params("Type"), ["blah", "hah"]);
        assert!(line.has_param("TYPE"));
        assert!(!line.has_param("ENCODING"));
    }

    #[test]
    fn set_param_replaces() {
        let mut line = ContentLine::new("DTSTART");
        line.set_param("TZID", "US/Pacific");
        line.set_param("tzid", "US/Eastern");
        assert_eq!(line.params.len(), 1);
        assert_eq!(line.param("TZID"), Some("US/Eastern"));
    }

    #[test]
    fn remove_param_returns_values() {
        let mut line = ContentLine::new("ATTACH");
        line.set_param("ENCODING", "BASE64");
        assert_eq!(line.remove_param("encoding"), Some(vec!["BASE64".into()]));
        assert!(line.params.is_empty());
    }

    #[test]
    fn equality_ignores_line_number() {
        let mut a = ContentLine::with_value("SUMMARY", "hi");
        let mut b = ContentLine::with_value("SUMMARY", "hi");
        a.line_number = Some(4);
        b.line_number = Some(9);
        assert_eq!(a, b);
    }
}
