//! Compiled match patterns.
//!
//! A pattern is either a literal string compared for exact equality or a
//! regular expression searched (unanchored) within the attribute value.
//! Regular expressions are compiled once, when the owning scope is built, so
//! a malformed expression surfaces as a [`ConfigError`] at load time and
//! never during request evaluation.
//!
//! Policies migrated from PCRE-based deployments often write expressions in
//! delimited form (`/^staff$/i`). Those are accepted: the delimiters are
//! stripped and the trailing modifiers become inline flags. A delimited
//! expression with a modifier that has no inline equivalent (`/x/D`) is
//! rejected, never compiled as a plain expression.

use regex::Regex;

use crate::error::ConfigError;

/// Characters recognized as the opening (and closing) delimiter of a
/// delimited expression.
const DELIMITERS: [char; 6] = ['/', '#', '~', '%', '@', '!'];

/// Modifiers that map one-to-one onto inline flags.
const MODIFIERS: &str = "imsxuU";

/// One compiled pattern of a match rule.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Option<Regex>,
}

impl Pattern {
    /// A pattern that matches only a value equal to `source`.
    pub fn literal(source: &str) -> Self {
        Self {
            source: source.to_string(),
            regex: None,
        }
    }

    /// Compiles `source` as a regular expression.
    ///
    /// `attribute` is only used to label the error.
    pub fn regex(attribute: &str, source: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidPattern {
            attribute: attribute.to_string(),
            pattern: source.to_string(),
            reason,
        };

        let expression = translate_delimited(source)
            .map_err(invalid)?
            .unwrap_or_else(|| source.to_string());
        let regex = Regex::new(&expression).map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            source: source.to_string(),
            regex: Some(regex),
        })
    }

    /// The pattern exactly as configured.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Tests a single attribute value.
    pub fn matches(&self, value: &str) -> bool {
        match &self.regex {
            Some(re) => re.is_match(value),
            None => self.source == value,
        }
    }
}

/// Rewrites a delimited expression (`/body/flags`) into `(?flags)body`.
///
/// Returns `Ok(None)` when `source` is not in delimited form; the caller then
/// uses it verbatim. Trailing letters after the closing delimiter are always
/// read as modifiers, so an unsupported one is an error.
fn translate_delimited(source: &str) -> Result<Option<String>, String> {
    let Some(open) = source.chars().next().filter(|c| DELIMITERS.contains(c)) else {
        return Ok(None);
    };
    let end = match source.rfind(open) {
        Some(end) if end > 0 => end,
        _ => return Ok(None),
    };

    let body = &source[open.len_utf8()..end];
    let modifiers = &source[end + open.len_utf8()..];
    if !modifiers.chars().all(|c| c.is_ascii_alphabetic()) {
        return Ok(None);
    }
    if let Some(bad) = modifiers.chars().find(|&c| !MODIFIERS.contains(c)) {
        return Err(format!("unsupported modifier '{bad}' in delimited pattern"));
    }

    // `u` is implied: expressions are always Unicode-aware.
    let flags: String = modifiers.chars().filter(|&c| c != 'u').collect();
    if flags.is_empty() {
        Ok(Some(body.to_string()))
    } else {
        Ok(Some(format!("(?{flags}){body}")))
    }
}
