//! Name filter predicate for list queries.
//!
//! # Responsibility
//! - Compile external filter patterns into a reusable name predicate.
//!
//! # Invariants
//! - Matching is case-sensitive for every pattern form.
//! - `glob:` patterns must match the whole name; other forms may match a part.

use crate::library::error::ValidationError;
use regex::Regex;

const GLOB_PREFIX: &str = "glob:";
const REGEXP_PREFIX: &str = "regexp:";

/// Compiled name filter.
#[derive(Debug, Clone)]
pub enum NameFilter {
    /// Plain pattern, matched as a substring.
    Substring(String),
    /// `glob:` pattern with `*`, `?` and `[...]` classes.
    ///
    /// `*` and `?` never match `/`, so `glob:web/*` stays one level deep.
    /// A malformed glob is a parse error, not a filter that matches nothing.
    Glob(Regex),
    /// `regexp:` pattern searched anywhere in the name.
    Regex(Regex),
}

impl NameFilter {
    /// Parses one filter pattern.
    ///
    /// # Errors
    /// - Returns `ValidationError::InvalidFilter` when a glob or regular
    ///   expression cannot be compiled.
    pub fn parse(pattern: &str) -> Result<Self, ValidationError> {
        if let Some(glob) = pattern.strip_prefix(GLOB_PREFIX) {
            let source = glob_to_regex(glob).map_err(|message| invalid(pattern, message))?;
            let compiled = Regex::new(&source).map_err(|err| invalid(pattern, err.to_string()))?;
            return Ok(Self::Glob(compiled));
        }
        if let Some(expr) = pattern.strip_prefix(REGEXP_PREFIX) {
            let compiled = Regex::new(expr).map_err(|err| invalid(pattern, err.to_string()))?;
            return Ok(Self::Regex(compiled));
        }
        Ok(Self::Substring(pattern.to_string()))
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Substring(needle) => name.contains(needle.as_str()),
            Self::Glob(re) | Self::Regex(re) => re.is_match(name),
        }
    }
}

fn invalid(pattern: &str, message: impl Into<String>) -> ValidationError {
    ValidationError::InvalidFilter {
        pattern: pattern.to_string(),
        message: message.into(),
    }
}

/// Translates a shell glob into an anchored regular expression.
fn glob_to_regex(glob: &str) -> Result<String, String> {
    let mut out = String::with_capacity(glob.len() * 2 + 2);
    out.push('^');
    let mut chars = glob.chars();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '\\' => {
                let escaped = chars
                    .next()
                    .ok_or_else(|| "trailing escape character".to_string())?;
                push_literal(&mut out, escaped);
            }
            '[' => {
                out.push('[');
                let mut rest = chars.clone().peekable();
                if matches!(rest.peek(), Some('!') | Some('^')) {
                    chars.next();
                    out.push('^');
                }
                let mut closed = false;
                while let Some(member) = chars.next() {
                    match member {
                        ']' => {
                            closed = true;
                            break;
                        }
                        '\\' => {
                            let escaped = chars
                                .next()
                                .ok_or_else(|| "trailing escape character".to_string())?;
                            push_literal(&mut out, escaped);
                        }
                        // Regex class operators (`[`, `&&`, `~~`) are literals in globs.
                        '[' | '&' | '~' => {
                            out.push('\\');
                            out.push(member);
                        }
                        other => out.push(other),
                    }
                }
                if !closed {
                    return Err("unterminated character class".to_string());
                }
                out.push(']');
            }
            other => push_literal(&mut out, other),
        }
    }
    out.push('$');
    Ok(out)
}

fn push_literal(out: &mut String, c: char) {
    let mut buf = [0u8; 4];
    out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
}
