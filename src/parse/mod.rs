//! Reading components from text: lexer, line grammar, and the BEGIN/END
//! stack machine.

mod lexer;
mod line;

pub use lexer::LogicalLines;
pub use line::parse_line;

use crate::behavior;
use crate::core::{Component, Node};
use crate::error::{ParseError, Result, VObjectError};

/// Options controlling the read entry points.
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// Run each component's behavior validation after parsing.
    pub validate: bool,
    /// Transform values to their native representation after parsing.
    pub transform: bool,
    /// Log and skip malformed lines instead of aborting the stream.
    pub ignore_unreadable: bool,
    /// Enable the vCard 2.1 quoted-printable soft-break lexer rule.
    pub allow_qp: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            validate: false,
            transform: true,
            ignore_unreadable: false,
            allow_qp: false,
        }
    }
}

/// Yields top-level components from `input` one at a time.
///
/// Errors terminate the iterator; the yielded [`ParseError`] carries the
/// offending line number and the input stream.
#[must_use]
pub fn read_components<'a>(input: &'a str, options: &ParseOptions) -> ComponentIter<'a> {
    ComponentIter {
        lines: LogicalLines::new(input, options.allow_qp),
        input,
        options: *options,
        stack: Vec::new(),
        version: None,
        last_line: 0,
        finished: false,
    }
}

/// Returns the first component from `input`.
///
/// ## Errors
/// Fails on malformed input or when the stream holds no component.
#[tracing::instrument(skip(input, options), fields(input_len = input.len()))]
pub fn read_one(input: &str, options: &ParseOptions) -> Result<Component> {
    read_components(input, options)
        .next()
        .unwrap_or_else(|| Err(ParseError::new("no components found in stream").into()))
}

/// Iterator over the top-level components of a stream.
pub struct ComponentIter<'a> {
    lines: LogicalLines<'a>,
    input: &'a str,
    options: ParseOptions,
    stack: Vec<Component>,
    version: Option<String>,
    last_line: usize,
    finished: bool,
}

impl ComponentIter<'_> {
    fn fail(&mut self, err: VObjectError) -> Option<Result<Component>> {
        self.finished = true;
        let err = match err {
            VObjectError::Parse(mut e) => {
                if e.input.is_none() {
                    e.input = Some(self.input.to_string());
                }
                VObjectError::Parse(e)
            }
            other => other,
        };
        Some(Err(err))
    }

    fn add_to_top(&mut self, node: Node) -> Result<()> {
        if self.stack.is_empty() {
            self.stack.push(Component::unnamed());
        }
        let top = self.stack.last_mut().expect("stack is non-empty");
        top.add_node(node)?;
        Ok(())
    }

    /// Binds behavior, validates, and transforms a completed top-level
    /// component.
    fn finish_component(&self, mut component: Component) -> Result<Component> {
        let b = match &self.version {
            Some(version) => behavior::get_behavior(&component.name, Some(version))
                .or_else(|| behavior::get_behavior(&component.name, None)),
            None => behavior::get_behavior(&component.name, None),
        };
        if let Some(b) = b {
            component.set_behavior(b)?;
        }
        if self.options.validate {
            component.validate()?;
        }
        if self.options.transform {
            component.transform_to_native()?;
        }
        Ok(component)
    }
}

impl Iterator for ComponentIter<'_> {
    type Item = Result<Component>;

    fn next(&mut self) -> Option<Result<Component>> {
        if self.finished {
            return None;
        }
        loop {
            let Some((text, number)) = self.lines.next() else {
                break;
            };
            self.last_line = number;

            let line = match parse_line(&text, Some(number)) {
                Ok(line) => line,
                Err(err) => {
                    if self.options.ignore_unreadable {
                        match err.line_number() {
                            Some(n) => tracing::error!(line = n, error = %err, "skipped line"),
                            None => tracing::error!(error = %err, "skipped a line"),
                        }
                        continue;
                    }
                    return self.fail(err);
                }
            };

            match line.name.as_str() {
                "VERSION" => {
                    self.version = line.value.as_raw().map(str::to_string);
                    if let Err(err) = self.add_to_top(Node::Line(line)) {
                        return self.fail(err);
                    }
                }
                "BEGIN" => {
                    let name = line.value.as_raw().unwrap_or_default();
                    let mut component = Component::new(name);
                    component.group = line.group.clone();
                    self.stack.push(component);
                }
                "PROFILE" => {
                    if self.stack.is_empty() {
                        self.stack.push(Component::unnamed());
                    }
                    let name = line.value.as_raw().unwrap_or_default().to_string();
                    let top = self.stack.last_mut().expect("stack is non-empty");
                    if let Err(err) = top.set_profile(&name) {
                        return self.fail(err);
                    }
                }
                "END" => {
                    let name = line
                        .value
                        .as_raw()
                        .unwrap_or_default()
                        .to_ascii_uppercase();
                    let Some(top_name) = self.stack.last().map(|c| c.name.clone()) else {
                        return self.fail(
                            ParseError::at_line(
                                format!(
                                    "attempted to end the {name} component but it was never opened"
                                ),
                                number,
                            )
                            .into(),
                        );
                    };
                    if name != top_name {
                        return self.fail(
                            ParseError::at_line(
                                format!("{top_name} component wasn't closed"),
                                number,
                            )
                            .into(),
                        );
                    }
                    let component = self.stack.pop().expect("stack is non-empty");
                    if self.stack.is_empty() {
                        match self.finish_component(component) {
                            Ok(done) => return Some(Ok(done)),
                            Err(err) => return self.fail(err),
                        }
                    } else if let Err(err) = self.add_to_top(Node::Component(component)) {
                        return self.fail(err);
                    }
                }
                _ => {
                    if let Err(err) = self.add_to_top(Node::Line(line)) {
                        return self.fail(err);
                    }
                }
            }
        }

        self.finished = true;
        let top = self.stack.pop()?;
        if top.name.is_empty() {
            tracing::warn!("top level component was never named");
        } else if top.use_begin {
            return self.fail(
                ParseError::at_line(
                    format!("component {} was never closed", top.name),
                    self.last_line,
                )
                .into(),
            );
        }
        match self.finish_component(top) {
            Ok(done) => Some(Ok(done)),
            Err(err) => self.fail(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;

    const SIMPLE: &str = "\
BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:-//Test//Test//EN\r\n\
BEGIN:VEVENT\r\n\
UID:test-uid-123@example.com\r\n\
DTSTAMP:20260123T120000Z\r\n\
DTSTART:20260123T140000Z\r\n\
SUMMARY:Test Event\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

    #[test]
    fn read_one_simple() {
        let cal = read_one(SIMPLE, &ParseOptions::default()).unwrap();
        assert_eq!(cal.name, "VCALENDAR");
        let event = cal.component("vevent").unwrap();
        assert_eq!(event.child_text("uid"), Some("test-uid-123@example.com"));
        assert_eq!(event.child_text("summary"), Some("Test Event"));
    }

    #[test]
    fn version_binds_behavior() {
        let cal = read_one(SIMPLE, &ParseOptions::default()).unwrap();
        assert!(cal.behavior.is_some());
        assert_eq!(cal.behavior.unwrap().version, Some("2.0"));
    }

    #[test]
    fn transform_produces_native_datetimes() {
        let cal = read_one(SIMPLE, &ParseOptions::default()).unwrap();
        let event = cal.component("vevent").unwrap();
        let dtstart = event.child_value("dtstart").unwrap();
        assert!(matches!(dtstart, Value::DateTime(dt) if dt.is_utc()));
    }

    #[test]
    fn mismatched_end_is_an_error() {
        let input = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nEND:VEVENT\r\n";
        let err = read_one(input, &ParseOptions::default()).unwrap_err();
        assert_eq!(err.line_number(), Some(3));
    }

    #[test]
    fn unclosed_component_is_an_error() {
        let input = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\n";
        let err = read_one(input, &ParseOptions::default()).unwrap_err();
        assert!(err.to_string().contains("never closed"));
    }

    #[test]
    fn end_without_begin_is_an_error() {
        let input = "END:VCALENDAR\r\n";
        let err = read_one(input, &ParseOptions::default()).unwrap_err();
        assert!(err.to_string().contains("never opened"));
    }

    #[test]
    fn ignore_unreadable_skips_bad_lines() {
        let input = "\
BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
THIS LINE IS NOT PARSEABLE\r\n\
END:VCALENDAR\r\n";
        let options = ParseOptions {
            ignore_unreadable: true,
            ..ParseOptions::default()
        };
        let cal = read_one(input, &options).unwrap();
        assert_eq!(cal.name, "VCALENDAR");
    }

    #[test]
    fn multiple_top_level_components() {
        let input = "\
BEGIN:VCALENDAR\r\nVERSION:2.0\r\nEND:VCALENDAR\r\n\
BEGIN:VCALENDAR\r\nVERSION:2.0\r\nEND:VCALENDAR\r\n";
        let comps: Vec<_> = read_components(input, &ParseOptions::default())
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(comps.len(), 2);
    }

    #[test]
    fn empty_component_round_trips() {
        let input = "BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n";
        let cal = read_one(input, &ParseOptions::default()).unwrap();
        assert!(cal.is_empty());
    }

    #[test]
    fn error_carries_input() {
        let input = "BEGIN:VCALENDAR\r\nEND:VEVENT\r\n";
        let err = read_one(input, &ParseOptions::default()).unwrap_err();
        match err {
            VObjectError::Parse(e) => assert_eq!(e.input.as_deref(), Some(input)),
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}
