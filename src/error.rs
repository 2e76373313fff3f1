//! Error types for parsing, native transformation, and validation.

use std::fmt;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, VObjectError>;

/// Top-level error for all fallible operations.
#[derive(Debug, thiserror::Error)]
pub enum VObjectError {
    /// Malformed input at the lexical, grammar, or tree level.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Failure while converting a native value back to its textual form.
    #[error(transparent)]
    Native(#[from] NativeError),

    /// A behavior's cardinality or semantic check failed.
    #[error(transparent)]
    Validate(#[from] ValidateError),

    /// Programming misuse, e.g. a double quote inside a parameter value or
    /// a component given two profiles.
    #[error("{0}")]
    Usage(String),
}

impl VObjectError {
    /// Builds a [`VObjectError::Usage`] from anything printable.
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    /// Returns the source line number, if this error carries one.
    #[must_use]
    pub fn line_number(&self) -> Option<usize> {
        match self {
            Self::Parse(e) => e.line_number,
            Self::Native(e) => e.line_number,
            Self::Validate(_) | Self::Usage(_) => None,
        }
    }

    /// Fills in the line number on parse and native errors that lack one.
    #[must_use]
    pub(crate) fn with_line_number(mut self, line_number: Option<usize>) -> Self {
        match &mut self {
            Self::Parse(e) => {
                if e.line_number.is_none() {
                    e.line_number = line_number;
                }
            }
            Self::Native(e) => {
                if e.line_number.is_none() {
                    e.line_number = line_number;
                }
            }
            Self::Validate(_) | Self::Usage(_) => {}
        }
        self
    }
}

/// Malformed input, carrying the offending line number when known and, at
/// the outermost level, the input stream for diagnostics.
#[derive(Debug, Default)]
pub struct ParseError {
    /// Human-readable description of what failed to parse.
    pub message: String,
    /// 1-based number of the first physical line of the offending logical line.
    pub line_number: Option<usize>,
    /// The full input, attached by the top-level reader.
    pub input: Option<String>,
    /// The underlying failure, when this error wraps another.
    pub source: Option<Box<VObjectError>>,
}

impl ParseError {
    /// Creates a parse error with no position information.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Creates a parse error anchored to a source line.
    pub fn at_line(message: impl Into<String>, line_number: usize) -> Self {
        Self {
            message: message.into(),
            line_number: Some(line_number),
            ..Self::default()
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line_number {
            Some(n) => write!(f, "at line {n}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Failure during native-to-text conversion.
#[derive(Debug, Default)]
pub struct NativeError {
    /// Human-readable description of the conversion failure.
    pub message: String,
    /// 1-based source line, when the value came from parsed input.
    pub line_number: Option<usize>,
    /// The underlying failure, when this error wraps another.
    pub source: Option<Box<VObjectError>>,
}

impl NativeError {
    /// Creates a native-conversion error with no position information.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line_number {
            Some(n) => write!(f, "at line {n}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for NativeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// A behavior's validation check failed.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ValidateError {
    /// Which rule was violated.
    pub message: String,
}

impl ValidateError {
    /// Creates a validation error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_display_with_line() {
        let err = ParseError::at_line("bad line", 7);
        assert_eq!(err.to_string(), "at line 7: bad line");
    }

    #[test]
    fn parse_error_display_without_line() {
        let err = ParseError::new("bad input");
        assert_eq!(err.to_string(), "bad input");
    }

    #[test]
    fn with_line_number_fills_missing() {
        let err = VObjectError::from(ParseError::new("oops")).with_line_number(Some(3));
        assert_eq!(err.line_number(), Some(3));
    }

    #[test]
    fn with_line_number_keeps_existing() {
        let err = VObjectError::from(ParseError::at_line("oops", 2)).with_line_number(Some(9));
        assert_eq!(err.line_number(), Some(2));
    }
}
