//! The content-line grammar: `[group "."] name *(";" param) ":" value`.

use crate::codec;
use crate::core::{ContentLine, Value, normalize_name};
use crate::error::{ParseError, Result};

fn is_name_char(c: char) -> bool {
    // Underscore is not legal for names; it is accepted because some
    // legacy producers emit it, and normalized to a dash.
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Parses one logical line into a [`ContentLine`] with a raw value.
///
/// Quoted-printable values (an `ENCODING=QUOTED-PRINTABLE` parameter or a
/// bare `QUOTED-PRINTABLE` singleton, as vCard 2.1 writes them) are decoded
/// immediately and the marker removed.
///
/// ## Errors
/// Returns a [`ParseError`] carrying `line_number` on malformed lines.
pub fn parse_line(text: &str, line_number: Option<usize>) -> Result<ContentLine> {
    let fail = |msg: &str| {
        crate::error::VObjectError::from(ParseError {
            message: format!("{msg}: {text}"),
            line_number,
            ..ParseError::default()
        })
    };

    let mut scanner = Scanner::new(text);

    let first_token = scanner.take_while(is_name_char);
    if first_token.is_empty() {
        return Err(fail("failed to parse line"));
    }
    let (group, name) = if scanner.peek() == Some('.') {
        scanner.next_char();
        let name = scanner.take_while(is_name_char);
        if name.is_empty() {
            return Err(fail("failed to parse line"));
        }
        (Some(first_token.to_string()), name)
    } else {
        (None, first_token)
    };

    let mut raw_params: Vec<(String, Vec<String>)> = Vec::new();
    let mut singletons: Vec<String> = Vec::new();
    loop {
        match scanner.next_char() {
            Some(':') => break,
            Some(';') => {
                if matches!(scanner.peek(), Some(':' | ';') | None) {
                    continue;
                }
                let param_name = scanner.take_while(is_name_char);
                if param_name.is_empty() {
                    return Err(fail("failed to parse parameter name"));
                }
                match scanner.peek() {
                    Some('=') => {
                        scanner.next_char();
                        let values = parse_param_values(&mut scanner);
                        if values.is_empty() {
                            // `NAME=` with nothing after the equals sign
                            // reads like a bare vCard 2.1 parameter value.
                            singletons.push(param_name.to_string());
                        } else {
                            raw_params.push((normalize_name(param_name), values));
                        }
                    }
                    // `NAME,VALUE` without `=`: the trailing tokens count
                    // as the parameter's values.
                    Some(',') => {
                        scanner.next_char();
                        let values = parse_param_values(&mut scanner);
                        raw_params.push((normalize_name(param_name), values));
                    }
                    _ => singletons.push(param_name.to_string()),
                }
            }
            _ => return Err(fail("failed to parse line")),
        }
    }

    let value = scanner.rest().to_string();

    let mut line = ContentLine::new(name);
    line.group = group;
    line.line_number = line_number;
    for (param_name, values) in raw_params {
        for value in values {
            line.add_param_value(&param_name, value);
        }
    }
    line.singleton_params = singletons;
    line.value = Value::Raw(value);

    apply_quoted_printable(&mut line);
    Ok(line)
}

/// Parses comma-separated parameter values up to (not including) the next
/// `;` or `:`. An unquoted `"` in the middle of a value closes the current
/// fragment and starts a quoted one; both become separate values, matching
/// the lenient treatment of non-conformant input this format family needs.
fn parse_param_values(scanner: &mut Scanner<'_>) -> Vec<String> {
    let mut values = Vec::new();
    loop {
        // One comma-separated value; an unquoted `"` closes the fragment in
        // progress, so a single value slot may yield several values.
        let mut pushed = false;
        loop {
            match scanner.peek() {
                Some('"') => {
                    scanner.next_char();
                    let mut quoted = String::new();
                    while let Some(c) = scanner.next_char() {
                        if c == '"' {
                            break;
                        }
                        quoted.push(c);
                    }
                    values.push(quoted);
                    pushed = true;
                }
                Some(c) if !matches!(c, ',' | ';' | ':') => {
                    let fragment =
                        scanner.take_while(|c| !matches!(c, ',' | ';' | ':' | '"'));
                    values.push(fragment.to_string());
                    pushed = true;
                }
                _ => break,
            }
        }
        match scanner.peek() {
            Some(',') => {
                scanner.next_char();
                if !pushed {
                    values.push(String::new());
                }
            }
            _ => return values,
        }
    }
}

/// Decodes a quoted-printable value in place and drops the marker, per the
/// vCard 2.1 convention (including bare `QUOTED-PRINTABLE` singletons).
fn apply_quoted_printable(line: &mut ContentLine) {
    let mut qp = false;

    if let Some(entry) = line
        .params
        .iter_mut()
        .find(|p| p.name.eq_ignore_ascii_case("ENCODING"))
    {
        let before = entry.values.len();
        entry
            .values
            .retain(|v| !v.eq_ignore_ascii_case("QUOTED-PRINTABLE"));
        if entry.values.len() != before {
            qp = true;
        }
    }
    line.params
        .retain(|p| !(p.name.eq_ignore_ascii_case("ENCODING") && p.values.is_empty()));

    let before = line.singleton_params.len();
    line.singleton_params
        .retain(|s| !s.eq_ignore_ascii_case("QUOTED-PRINTABLE"));
    if line.singleton_params.len() != before {
        qp = true;
    }

    if qp {
        // CHARSET declarations other than UTF-8 are decoded as UTF-8,
        // lossily.
        let taken = std::mem::replace(&mut line.value, Value::empty());
        if let Value::Raw(text) = taken {
            line.value = Value::Raw(codec::decode_quoted_printable(&text));
        }
    }
}

struct Scanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.text[start..self.pos]
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_line() {
        let line = parse_line("SUMMARY:Team Meeting", Some(1)).unwrap();
        assert_eq!(line.name, "SUMMARY");
        assert!(line.params.is_empty());
        assert_eq!(line.value.as_raw(), Some("Team Meeting"));
        assert_eq!(line.line_number, Some(1));
    }

    #[test]
    fn group_prefix() {
        let line = parse_line("item1.TEL:+1-555-555-5555", None).unwrap();
        assert_eq!(line.group.as_deref(), Some("item1"));
        assert_eq!(line.name, "TEL");
    }

    #[test]
    fn underscore_normalized() {
        let line = parse_line("X_TEST:value", None).unwrap();
        assert_eq!(line.name, "X-TEST");
    }

    #[test]
    fn multi_value_params() {
        let line =
            parse_line("EMAIL;TYPE=\"blah\",hah;INTERNET=\"DIGI\",DERIDOO:john@nowhere.com", None)
                .unwrap();
        assert_eq!(line.name, "EMAIL");
        assert_eq!(line.params("TYPE"), ["blah", "hah"]);
        assert_eq!(line.params("INTERNET"), ["DIGI", "DERIDOO"]);
        assert_eq!(line.value.as_raw(), Some("john@nowhere.com"));
    }

    #[test]
    fn quoted_param_keeps_delimiters() {
        let line = parse_line("TEST;ALTREP=\"http://www.wiz.org\":value:;\"", None).unwrap();
        assert_eq!(line.param("ALTREP"), Some("http://www.wiz.org"));
        assert_eq!(line.value.as_raw(), Some("value:;\""));
    }

    #[test]
    fn value_may_contain_colons() {
        let line = parse_line("URL:https://example.com:8080/path", None).unwrap();
        assert_eq!(line.value.as_raw(), Some("https://example.com:8080/path"));
    }

    #[test]
    fn illegal_mid_value_quote_splits_fragments() {
        let line = parse_line("X;P=start\"after-illegal-quote\":v", None).unwrap();
        assert_eq!(line.params("P"), ["start", "after-illegal-quote"]);
    }

    #[test]
    fn singleton_parameter() {
        let line = parse_line("TEL;HOME;VOICE:+1-555-555-5555", None).unwrap();
        assert_eq!(line.singleton_params, ["HOME", "VOICE"]);
    }

    #[test]
    fn bare_parameter_with_comma_values() {
        // vCard 2.1 allows `NAME,VALUE` with no equals sign; the trailing
        // tokens become the parameter's values.
        let line = parse_line("TEL;HOME,WORK:+1", None).unwrap();
        assert_eq!(line.params("HOME"), ["WORK"]);
        assert!(line.singleton_params.is_empty());
        assert_eq!(line.value.as_raw(), Some("+1"));
    }

    #[test]
    fn quoted_printable_encoding_param() {
        let line = parse_line(
            "LABEL;ENCODING=QUOTED-PRINTABLE:123 Main=0D=0AAnytown",
            None,
        )
        .unwrap();
        assert!(!line.has_param("ENCODING"));
        assert_eq!(line.value.as_raw(), Some("123 Main\r\nAnytown"));
    }

    #[test]
    fn quoted_printable_singleton() {
        let line = parse_line("NOTE;QUOTED-PRINTABLE:caf=C3=A9", None).unwrap();
        assert!(line.singleton_params.is_empty());
        assert_eq!(line.value.as_raw(), Some("café"));
    }

    #[test]
    fn missing_colon_is_error() {
        let err = parse_line("INVALID", Some(12)).unwrap_err();
        assert_eq!(err.line_number(), Some(12));
    }

    #[test]
    fn repeated_parameter_merges() {
        let line = parse_line("A;X=1;X=2:v", None).unwrap();
        assert_eq!(line.params("X"), ["1", "2"]);
    }

    #[test]
    fn empty_param_value_reads_as_singleton() {
        let line = parse_line("TEL;HOME=:+1", None).unwrap();
        assert_eq!(line.singleton_params, ["HOME"]);
    }
}
