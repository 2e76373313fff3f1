//! Logical-line reconstruction.
//!
//! Two line-continuation schemes coexist in the wild: the iCalendar /
//! vCard 3.0 fold (a physical line starting with SPACE or HTAB continues
//! the previous one, the whitespace removed) and vCard 2.1's
//! quoted-printable soft break (a line ending in `=` under a
//! `quoted-printable` encoding continues on the next physical line with no
//! whitespace stripping). The two never share state: the QP rule only
//! applies when the caller opts in.

/// Splits input into physical lines, accepting CRLF, LF, or CR endings.
pub fn physical_lines(input: &str) -> PhysicalLines<'_> {
    PhysicalLines { rest: input }
}

/// Iterator over physical lines; see [`physical_lines`].
pub struct PhysicalLines<'a> {
    rest: &'a str,
}

impl<'a> Iterator for PhysicalLines<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.rest.is_empty() {
            return None;
        }
        let bytes = self.rest.as_bytes();
        let mut end = bytes.len();
        let mut next_start = bytes.len();
        for (i, &b) in bytes.iter().enumerate() {
            if b == b'\n' {
                end = i;
                next_start = i + 1;
                break;
            }
            if b == b'\r' {
                end = i;
                next_start = if bytes.get(i + 1) == Some(&b'\n') {
                    i + 2
                } else {
                    i + 1
                };
                break;
            }
        }
        let line = &self.rest[..end];
        self.rest = &self.rest[next_start..];
        Some(line)
    }
}

/// Iterator yielding `(logical_line, first_physical_line_number)` pairs.
///
/// Line numbers are 1-based. Blank physical lines terminate the current
/// logical line, yielding it when non-empty.
pub struct LogicalLines<'a> {
    lines: std::iter::Enumerate<PhysicalLines<'a>>,
    allow_qp: bool,
    buffer: String,
    start_line: usize,
    quoted_printable: bool,
    done: bool,
}

impl<'a> LogicalLines<'a> {
    /// Creates the iterator; `allow_qp` enables the vCard 2.1 soft-break
    /// rule.
    #[must_use]
    pub fn new(input: &'a str, allow_qp: bool) -> Self {
        Self {
            lines: physical_lines(input).enumerate(),
            allow_qp,
            buffer: String::new(),
            start_line: 1,
            quoted_printable: false,
            done: false,
        }
    }

    fn take_buffer(&mut self) -> (String, usize) {
        let line = std::mem::take(&mut self.buffer);
        (line, self.start_line)
    }
}

impl Iterator for LogicalLines<'_> {
    type Item = (String, usize);

    fn next(&mut self) -> Option<(String, usize)> {
        if self.done {
            return None;
        }
        loop {
            let Some((index, raw)) = self.lines.next() else {
                self.done = true;
                if self.buffer.is_empty() {
                    return None;
                }
                return Some(self.take_buffer());
            };
            let number = index + 1;

            if raw.trim().is_empty() {
                self.quoted_printable = false;
                if !self.buffer.is_empty() {
                    return Some(self.take_buffer());
                }
                continue;
            }

            let mut yielded = None;
            if self.quoted_printable && self.allow_qp {
                // QP soft break: keep the line intact, joined by a newline.
                self.buffer.push('\n');
                self.buffer.push_str(raw);
                self.quoted_printable = false;
            } else if raw.starts_with(' ') || raw.starts_with('\t') {
                if self.buffer.is_empty() {
                    self.start_line = number;
                }
                self.buffer.push_str(&raw[1..]);
            } else if self.buffer.is_empty() {
                self.start_line = number;
                self.buffer.push_str(raw);
            } else {
                yielded = Some(self.take_buffer());
                self.start_line = number;
                self.buffer.push_str(raw);
            }

            if self.allow_qp
                && self.buffer.ends_with('=')
                && self.buffer.to_ascii_lowercase().contains("quoted-printable")
            {
                self.quoted_printable = true;
            }

            if yielded.is_some() {
                return yielded;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(input: &str, allow_qp: bool) -> Vec<(String, usize)> {
        LogicalLines::new(input, allow_qp).collect()
    }

    #[test]
    fn physical_line_endings() {
        let lines: Vec<_> = physical_lines("a\r\nb\nc\rd").collect();
        assert_eq!(lines, ["a", "b", "c", "d"]);
    }

    #[test]
    fn unfold_continuation() {
        let got = collect("DESCRIPTION:Hello\r\n , World!\r\n", false);
        assert_eq!(got, [("DESCRIPTION:Hello, World!".to_string(), 1)]);
    }

    #[test]
    fn tab_continuation() {
        let got = collect("SUMMARY:one\r\n\ttwo\r\n", false);
        assert_eq!(got, [("SUMMARY:onetwo".to_string(), 1)]);
    }

    #[test]
    fn separate_lines_numbered() {
        let got = collect("LINE1:a\nLINE2:b\n", false);
        assert_eq!(
            got,
            [("LINE1:a".to_string(), 1), ("LINE2:b".to_string(), 2)]
        );
    }

    #[test]
    fn blank_line_terminates() {
        let got = collect("A:1\n\nB:2\n", false);
        assert_eq!(got, [("A:1".to_string(), 1), ("B:2".to_string(), 3)]);
    }

    #[test]
    fn quoted_printable_soft_break() {
        let input = "Line 1;encoding=quoted-printable:this is an evil=\n evil=\n format.\n";
        let got = collect(input, true);
        assert_eq!(got.len(), 1);
        assert_eq!(
            got[0].0,
            "Line 1;encoding=quoted-printable:this is an evil=\n evil=\n format."
        );
    }

    #[test]
    fn qp_rule_ignored_without_opt_in() {
        let input = "Line 1;encoding=quoted-printable:evil=\n continued\n";
        let got = collect(input, false);
        // Folded as an ordinary continuation: whitespace stripped.
        assert_eq!(got, [(
            "Line 1;encoding=quoted-printable:evil=continued".to_string(),
            1
        )]);
    }

    #[test]
    fn trailing_line_without_newline() {
        let got = collect("END:VCARD", false);
        assert_eq!(got, [("END:VCARD".to_string(), 1)]);
    }
}
