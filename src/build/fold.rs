//! Content-line folding at a fixed octet budget.

/// Default maximum line length in octets, not counting CRLF.
pub const MAX_LINE_OCTETS: usize = 75;

/// Folds a logical line into physical lines of at most `limit` octets,
/// continuations prefixed by CRLF + SPACE, and appends the result to `out`.
///
/// The break position never splits a multi-byte UTF-8 sequence: it backs up
/// until the byte is not a continuation byte. The terminating CRLF is
/// always emitted.
pub fn fold_line_into(out: &mut String, line: &str, limit: usize) {
    let bytes = line.as_bytes();
    if bytes.len() <= limit {
        out.push_str(line);
        out.push_str("\r\n");
        return;
    }

    let mut start = 0;
    let mut space_taken = 0;
    while bytes.len() - start > limit - space_taken {
        let mut end = start + limit - space_taken;
        while end > start && (bytes[end] & 0xC0) == 0x80 {
            end -= 1;
        }
        if end == start {
            // A single segment narrower than one codepoint; take it whole.
            end = start + 1;
            while end < bytes.len() && (bytes[end] & 0xC0) == 0x80 {
                end += 1;
            }
        }
        out.push_str(&line[start..end]);
        out.push_str("\r\n ");
        space_taken = 1;
        start = end;
    }
    out.push_str(&line[start..]);
    out.push_str("\r\n");
}

/// Folds a logical line and returns it as a new string.
#[must_use]
pub fn fold_line(line: &str, limit: usize) -> String {
    let mut out = String::with_capacity(line.len() + 8);
    fold_line_into(&mut out, line, limit);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unfold(s: &str) -> String {
        s.replace("\r\n ", "").replace("\r\n", "")
    }

    #[test]
    fn short_line_untouched() {
        assert_eq!(fold_line("SUMMARY:Short", 75), "SUMMARY:Short\r\n");
    }

    #[test]
    fn exactly_at_limit() {
        let line = "X".repeat(75);
        assert_eq!(fold_line(&line, 75), format!("{line}\r\n"));
    }

    #[test]
    fn long_line_folds_and_round_trips() {
        let line = "X".repeat(200);
        let folded = fold_line(&line, 75);
        assert!(folded.contains("\r\n "));
        assert_eq!(unfold(&folded), line);
        for physical in folded.split("\r\n").filter(|s| !s.is_empty()) {
            assert!(physical.len() <= 75, "physical line too long: {physical}");
        }
    }

    #[test]
    fn multibyte_never_split() {
        let prefix = "A".repeat(73);
        let line = format!("{prefix}日本語");
        let folded = fold_line(&line, 75);
        assert_eq!(unfold(&folded), line);
        for physical in folded.split("\r\n") {
            assert!(std::str::from_utf8(physical.as_bytes()).is_ok());
        }
    }

    #[test]
    fn continuation_lines_account_for_space() {
        let line = "A".repeat(80);
        let folded = fold_line(&line, 75);
        let physical: Vec<&str> = folded.split("\r\n").filter(|s| !s.is_empty()).collect();
        assert_eq!(physical.len(), 2);
        assert_eq!(physical[0].len(), 75);
        assert_eq!(physical[1], format!(" {}", "A".repeat(5)));
    }
}
