//! Parameter-value quoting for serialization.

use std::borrow::Cow;

use crate::error::{Result, VObjectError};

/// Returns `param` quoted when it contains `,`, `;`, or `:`.
///
/// ## Errors
/// Double quotes cannot be represented inside parameter values; a value
/// containing one is a usage error.
pub fn dquote_escape(param: &str) -> Result<Cow<'_, str>> {
    if param.contains('"') {
        return Err(VObjectError::usage(
            "double quotes aren't allowed in parameter values",
        ));
    }
    if param.contains([',', ';', ':']) {
        Ok(Cow::Owned(format!("\"{param}\"")))
    } else {
        Ok(Cow::Borrowed(param))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_value_untouched() {
        assert_eq!(dquote_escape("Simple").unwrap(), "Simple");
    }

    #[test]
    fn delimiters_force_quoting() {
        assert_eq!(dquote_escape("Doe, Jane").unwrap(), "\"Doe, Jane\"");
        assert_eq!(dquote_escape("a;b").unwrap(), "\"a;b\"");
        assert_eq!(dquote_escape("mailto:x").unwrap(), "\"mailto:x\"");
    }

    #[test]
    fn embedded_quote_is_an_error() {
        assert!(dquote_escape("has\"quote").is_err());
    }
}
